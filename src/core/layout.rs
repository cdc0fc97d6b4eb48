use core::ops::Range;

use crate::neuron::{NeuronId, NeuronRole};

/// Index ranges of each layer inside the neuron arena.
///
/// Neurons are stored contiguously: sensory first, then every inter layer in
/// order, then motor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    topology: Vec<usize>,
    sensory: Range<NeuronId>,
    inter: Vec<Range<NeuronId>>,
    motor: Range<NeuronId>,
}

impl Layout {
    pub fn from_topology(topology: &[usize]) -> Result<Self, &'static str> {
        if topology.len() < 2 {
            return Err("topology needs at least a sensory and a motor layer");
        }
        if topology.iter().any(|&n| n == 0) {
            return Err("every layer needs at least one neuron");
        }

        let mut start = 0;
        let mut ranges = Vec::with_capacity(topology.len());
        for &n in topology {
            ranges.push(start..start + n);
            start += n;
        }

        let motor = ranges.pop().unwrap_or(0..0);
        let sensory = ranges.remove(0);

        Ok(Self {
            topology: topology.to_vec(),
            sensory,
            inter: ranges,
            motor,
        })
    }

    pub fn topology(&self) -> &[usize] {
        &self.topology
    }

    pub fn sensory(&self) -> Range<NeuronId> {
        self.sensory.clone()
    }

    pub fn inter(&self) -> &[Range<NeuronId>] {
        &self.inter
    }

    pub fn last_inter(&self) -> Option<Range<NeuronId>> {
        self.inter.last().cloned()
    }

    pub fn motor(&self) -> Range<NeuronId> {
        self.motor.clone()
    }

    pub fn sensory_len(&self) -> usize {
        self.sensory.len()
    }

    pub fn motor_len(&self) -> usize {
        self.motor.len()
    }

    pub fn neuron_count(&self) -> usize {
        self.motor.end
    }

    /// All layers in order, sensory to motor.
    pub fn layers(&self) -> impl Iterator<Item = Range<NeuronId>> + '_ {
        core::iter::once(self.sensory.clone())
            .chain(self.inter.iter().cloned())
            .chain(core::iter::once(self.motor.clone()))
    }

    /// Everything downstream of the sensory layer.
    pub fn non_sensory(&self) -> Range<NeuronId> {
        self.sensory.end..self.motor.end
    }

    pub fn role_of(&self, id: NeuronId) -> Option<NeuronRole> {
        if self.sensory.contains(&id) {
            Some(NeuronRole::Sensory)
        } else if self.motor.contains(&id) {
            Some(NeuronRole::Motor)
        } else if id < self.motor.start {
            Some(NeuronRole::Inter)
        } else {
            None
        }
    }
}
