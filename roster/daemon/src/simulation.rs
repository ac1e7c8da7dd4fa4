//! Simulated host activity
//!
//! Populates an [`InMemoryHost`] with generated participants and keeps them
//! busy: walking around, changing latency and game mode, and occasionally
//! being replaced by newcomers. Seeded, so a run can be reproduced.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use roster_core::{
    GameMode, IconTexture, InMemoryHost, Latency, Location, Participant, ParticipantId,
    SessionManager,
};

const NAMES: &[&str] = &[
    "Alex", "Steve", "Kai", "Noor", "Ines", "Tariq", "Mika", "Lou", "Sasha", "Remy", "Juno",
    "Ezra", "Wren", "Ola", "Pia", "Theo",
];

const WORLDS: &[&str] = &["overworld", "nether", "end"];

const LATENCIES: &[Latency] = &[
    Latency::Five,
    Latency::Four,
    Latency::Three,
    Latency::Two,
    Latency::One,
];

/// Drives random changes on a host
#[derive(Debug)]
pub struct Simulation {
    rng: StdRng,
    online: Vec<ParticipantId>,
    joined: u64,
}

impl Simulation {
    /// Create a simulation; the same seed replays the same run
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            online: Vec::new(),
            joined: 0,
        }
    }

    /// Participants currently online, in join order
    pub fn online(&self) -> &[ParticipantId] {
        &self.online
    }

    /// Join `count` participants
    pub fn populate(&mut self, host: &InMemoryHost, count: usize) {
        for _ in 0..count {
            self.join_one(host);
        }
        tracing::info!(participants = host.len(), "Host populated");
    }

    /// One round of activity
    ///
    /// Every participant may move; a few change latency, game mode or skin,
    /// and one may leave and be replaced.
    pub fn step(&mut self, host: &InMemoryHost, manager: &SessionManager) {
        for index in 0..self.online.len() {
            let id = self.online[index];
            if self.rng.gen_bool(0.6) {
                host.relocate(&id, self.location());
            }
            if self.rng.gen_bool(0.1) {
                if let Some(latency) = LATENCIES.choose(&mut self.rng) {
                    host.set_latency(&id, *latency);
                }
            }
            if self.rng.gen_bool(0.05) {
                let mode = if self.rng.gen_bool(0.5) {
                    GameMode::Creative
                } else {
                    GameMode::Survival
                };
                manager.on_game_mode_change(id, mode);
            }
            if self.rng.gen_bool(0.05) {
                let skin = format!("skin-{:08x}", self.rng.gen::<u32>());
                if let Err(e) = manager.register_icon(id, IconTexture::new(skin, None)) {
                    tracing::warn!(participant = %id, error = %e, "Icon not registered");
                }
            }
        }

        if !self.online.is_empty() && self.rng.gen_bool(0.2) {
            let index = self.rng.gen_range(0..self.online.len());
            let gone = self.online.remove(index);
            host.leave(&gone);
            manager.remove_icon(&gone);
            self.join_one(host);
        }
    }

    fn join_one(&mut self, host: &InMemoryHost) {
        let id = ParticipantId::from_uuid(Uuid::from_u128(self.rng.gen()));
        let base = NAMES.choose(&mut self.rng).copied().unwrap_or("Guest");
        self.joined += 1;
        let name = format!("{base}{}", self.joined);

        let mut participant = Participant::new(id, name);
        participant.location = Some(self.location());
        host.join(participant);
        host.set_variable(id, "kills", self.rng.gen_range(0..200).to_string());
        if self.rng.gen_bool(0.2) {
            host.grant(id, "group.staff");
        }
        if self.rng.gen_bool(0.05) {
            host.grant(id, "group.admin");
        }
        self.online.push(id);
    }

    fn location(&mut self) -> Location {
        let world = WORLDS.choose(&mut self.rng).copied().unwrap_or("overworld");
        Location::new(
            world,
            self.rng.gen_range(-500.0..500.0),
            self.rng.gen_range(0.0..128.0),
            self.rng.gen_range(-500.0..500.0),
        )
    }
}
