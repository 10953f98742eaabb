//! CPU-side particle system
//!
//! Particles live in the local space of their scene node. Emission is done
//! by the owner (see [`crate::sky::rain::RainShooter`]); the system itself
//! only integrates motion and expires particles.

use glam::Vec3;

use super::resources::TextureHandle;

/// A single particle
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub age: f32,
    pub lifetime: f32,
    pub alpha: f32,
}

impl Particle {
    pub fn new(position: Vec3, velocity: Vec3, lifetime: f32) -> Self {
        Self {
            position,
            velocity,
            age: 0.0,
            lifetime,
            alpha: 1.0,
        }
    }

    /// Get normalized age (0 = just born, 1 = about to die)
    #[inline]
    pub fn normalized_age(&self) -> f32 {
        if self.lifetime <= 0.0 {
            1.0
        } else {
            (self.age / self.lifetime).min(1.0)
        }
    }

    /// Check if particle is still alive
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.age < self.lifetime
    }
}

/// Particle container with a hard capacity.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleSystem {
    texture_name: String,
    texture: Option<TextureHandle>,
    particles: Vec<Particle>,
    capacity: usize,
    /// Total particles ever accepted by [`emit`](Self::emit).
    emitted: u64,
    /// Fall direction used by renderers to orient streaks.
    pub streak: Vec3,
}

impl ParticleSystem {
    pub fn new(texture_name: impl Into<String>, texture: Option<TextureHandle>, capacity: usize) -> Self {
        Self {
            texture_name: texture_name.into(),
            texture,
            particles: Vec::with_capacity(capacity.min(1024)),
            capacity,
            emitted: 0,
            streak: Vec3::NEG_Y,
        }
    }

    /// Emit a single particle. Returns false when the system is full.
    pub fn emit(&mut self, particle: Particle) -> bool {
        if self.particles.len() >= self.capacity {
            return false;
        }
        self.particles.push(particle);
        self.emitted += 1;
        true
    }

    /// Integrate motion and drop expired particles.
    pub fn advance(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        for p in &mut self.particles {
            p.position += p.velocity * dt;
            p.age += dt;
        }
        self.particles.retain(Particle::is_alive);
    }

    /// Remove every particle.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn emitted_total(&self) -> u64 {
        self.emitted
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn texture_name(&self) -> &str {
        &self.texture_name
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_respects_capacity() {
        let mut ps = ParticleSystem::new("drop", None, 2);
        assert!(ps.emit(Particle::new(Vec3::ZERO, Vec3::NEG_Y, 1.0)));
        assert!(ps.emit(Particle::new(Vec3::ZERO, Vec3::NEG_Y, 1.0)));
        assert!(!ps.emit(Particle::new(Vec3::ZERO, Vec3::NEG_Y, 1.0)));
        assert_eq!(ps.len(), 2);
        assert_eq!(ps.emitted_total(), 2);
    }

    #[test]
    fn test_advance_moves_and_expires() {
        let mut ps = ParticleSystem::new("drop", None, 16);
        ps.emit(Particle::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -2.0, 0.0), 1.0));
        ps.emit(Particle::new(Vec3::ZERO, Vec3::NEG_Y, 3.0));

        ps.advance(0.5);
        assert_eq!(ps.len(), 2);
        assert!((ps.particles()[0].position.y - 9.0).abs() < 1e-5);

        ps.advance(0.5);
        // First particle reached its lifetime
        assert_eq!(ps.len(), 1);
        assert!((ps.particles()[0].lifetime - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_advance_zero_is_noop() {
        let mut ps = ParticleSystem::new("drop", None, 4);
        ps.emit(Particle::new(Vec3::ONE, Vec3::NEG_Y, 1.0));
        let before = ps.clone();
        ps.advance(0.0);
        assert_eq!(ps, before);
    }

    #[test]
    fn test_normalized_age() {
        let mut p = Particle::new(Vec3::ZERO, Vec3::ZERO, 2.0);
        assert_eq!(p.normalized_age(), 0.0);
        p.age = 1.0;
        assert!((p.normalized_age() - 0.5).abs() < 1e-6);
        let dead = Particle::new(Vec3::ZERO, Vec3::ZERO, 0.0);
        assert!(!dead.is_alive());
        assert_eq!(dead.normalized_age(), 1.0);
    }
}
