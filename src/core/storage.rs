//! Versioned, chunked network image.
//!
//! Layout: 8-byte magic, u32 version, then tagged chunks. Each chunk is
//! `tag[4] | len u32 | uncompressed_len u32 | lz4 block`, where `len` counts
//! everything after itself. Unknown tags are skipped on load.

use std::io::{self, Cursor, Read, Write};
use std::ops::RangeInclusive;

use crate::competition::CompetitionManager;
use crate::config::NetworkConfig;
use crate::engram::{Engram, MAX_RELEVANCE};
use crate::engram_manager::EngramManager;
use crate::hebbian::HebbianTrainer;
use crate::layout::Layout;
use crate::network::{Network, NetworkState};
use crate::neuron::{Neuron, NeuronRole, Potential, FACILITATION_MAX};
use crate::prediction::PredictionManager;
use crate::prng::Prng;
use crate::synapse::{Direction, Synapse, SynapseId, SynapseKind, Targets};

pub const MAGIC: &[u8; 8] = b"PLNET001";
pub const VERSION_V1: u32 = 1;

const TAG_CFG: [u8; 4] = *b"CFG0";
const TAG_PRNG: [u8; 4] = *b"PRNG";
const TAG_STAT: [u8; 4] = *b"STAT";
const TAG_NEURONS: [u8; 4] = *b"NEUR";
const TAG_SYNAPSES: [u8; 4] = *b"SYNP";
const TAG_ENGRAMS: [u8; 4] = *b"ENGR";
const TAG_PREDICTION: [u8; 4] = *b"PRED";

/// Largest decompressed chunk accepted on load.
const MAX_CHUNK_BYTES: usize = 256 << 20;

const UNIT: RangeInclusive<f32> = 0.0..=1.0;
const SIGNED_UNIT: RangeInclusive<f32> = -1.0..=1.0;
const NON_NEGATIVE: RangeInclusive<f32> = 0.0..=f32::MAX;
const FINITE: RangeInclusive<f32> = f32::MIN..=f32::MAX;

pub fn compress_lz4(input: &[u8]) -> Vec<u8> {
    lz4_flex::compress(input)
}

pub fn decompress_lz4(input: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    lz4_flex::decompress(input, expected_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))
}

/// Sink that only counts bytes; used for exact image sizes.
pub struct CountingWriter {
    written: usize,
}

impl CountingWriter {
    pub fn new() -> Self {
        Self { written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Default for CountingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written = self.written.saturating_add(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64_le<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_f32_le<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_bool<W: Write>(w: &mut W, v: bool) -> io::Result<()> {
    write_u32_le(w, u32::from(v))
}

pub fn write_len<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    let n = u32::try_from(n)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "length exceeds u32"))?;
    write_u32_le(w, n)
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())
}

pub fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_f32_le<R: Read>(r: &mut R) -> io::Result<f32> {
    Ok(f32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_bool<R: Read>(r: &mut R) -> io::Result<bool> {
    Ok(read_u32_le(r)? != 0)
}

pub fn read_len<R: Read>(r: &mut R) -> io::Result<usize> {
    Ok(read_u32_le(r)? as usize)
}

pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let n = read_len(r)?;
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid utf-8 string"))
}

/// Write a chunk whose payload is LZ4-compressed and preceded by the uncompressed length.
pub fn write_chunk_lz4<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    let uncompressed_len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?;
    let total_len = 4u32.saturating_add(
        u32::try_from(compressed.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?,
    );

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

pub fn read_chunk_header<R: Read>(r: &mut R) -> io::Result<([u8; 4], u32)> {
    let tag = read_exact::<4, _>(r)?;
    let len = read_u32_le(r)?;
    Ok((tag, len))
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn missing(tag: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("missing {tag}"))
}

struct Stat {
    clock: u64,
    state: NetworkState,
    density: f32,
    engram_detection: bool,
    predictive_mode: bool,
    resource_competition: bool,
    pruned_last_round: usize,
    next_auto: u64,
    next_local: u64,
    last_competition: u64,
}

impl Network {
    /// Serialize a versioned, chunked network image.
    pub fn save_image_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        write_u32_le(w, VERSION_V1)?;

        let mut buf = Vec::new();
        write_cfg_payload(&mut buf, &self.cfg)?;
        write_chunk_lz4(w, TAG_CFG, &buf)?;

        buf.clear();
        write_u64_le(&mut buf, self.rng.state())?;
        write_chunk_lz4(w, TAG_PRNG, &buf)?;

        buf.clear();
        self.write_stat_payload(&mut buf)?;
        write_chunk_lz4(w, TAG_STAT, &buf)?;

        buf.clear();
        self.write_neuron_payload(&mut buf)?;
        write_chunk_lz4(w, TAG_NEURONS, &buf)?;

        buf.clear();
        self.write_synapse_payload(&mut buf)?;
        write_chunk_lz4(w, TAG_SYNAPSES, &buf)?;

        buf.clear();
        self.write_engram_payload(&mut buf)?;
        write_chunk_lz4(w, TAG_ENGRAMS, &buf)?;

        buf.clear();
        self.write_prediction_payload(&mut buf)?;
        write_chunk_lz4(w, TAG_PREDICTION, &buf)?;

        Ok(())
    }

    /// Load a network image. Unknown chunks are skipped.
    pub fn load_image_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = read_exact::<8, _>(r)?;
        if &magic != MAGIC {
            return Err(invalid("bad network image magic"));
        }
        let version = read_u32_le(r)?;
        if version != VERSION_V1 {
            return Err(invalid("unsupported network image version"));
        }

        let mut cfg: Option<NetworkConfig> = None;
        let mut rng_state: Option<u64> = None;
        let mut stat: Option<Stat> = None;
        let mut neurons: Option<(Layout, Vec<Neuron>)> = None;
        let mut synapses: Option<Vec<Synapse>> = None;
        let mut engrams: Option<Vec<Engram>> = None;
        let mut prediction: Option<(Vec<Vec<f32>>, Vec<f32>)> = None;

        loop {
            let (tag, len) = match read_chunk_header(r) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };

            let payload = {
                let mut take = r.take(len as u64);
                let uncompressed_len = read_u32_le(&mut take)? as usize;
                if uncompressed_len > MAX_CHUNK_BYTES {
                    return Err(invalid("chunk exceeds size limit"));
                }
                let mut compressed = Vec::with_capacity((len as usize).saturating_sub(4));
                take.read_to_end(&mut compressed)?;
                decompress_lz4(&compressed, uncompressed_len)?
            };
            let mut c = Cursor::new(payload);

            match tag {
                TAG_CFG => cfg = Some(read_cfg_payload(&mut c)?),
                TAG_PRNG => rng_state = Some(read_u64_le(&mut c)?),
                TAG_STAT => stat = Some(read_stat_payload(&mut c)?),
                TAG_NEURONS => neurons = Some(read_neuron_payload(&mut c)?),
                TAG_SYNAPSES => synapses = Some(read_synapse_payload(&mut c)?),
                TAG_ENGRAMS => engrams = Some(read_engram_payload(&mut c)?),
                TAG_PREDICTION => prediction = Some(read_prediction_payload(&mut c)?),
                _ => {}
            }
        }

        let cfg = cfg.ok_or_else(|| missing("CFG0"))?;
        let rng_state = rng_state.ok_or_else(|| missing("PRNG"))?;
        let stat = stat.ok_or_else(|| missing("STAT"))?;
        let (layout, neurons) = neurons.ok_or_else(|| missing("NEUR"))?;
        let synapses = synapses.ok_or_else(|| missing("SYNP"))?;
        let engrams = engrams.unwrap_or_default();

        let n = neurons.len();
        if n != layout.neuron_count() {
            return Err(invalid("NEUR count mismatch"));
        }
        for s in &synapses {
            if s.pre >= n || s.targets().iter().any(|&t| t >= n) {
                return Err(invalid("SYNP references unknown neuron"));
            }
        }
        if !synapses.windows(2).all(|w| w[0].id < w[1].id) {
            return Err(invalid("SYNP ids out of order"));
        }
        for e in &engrams {
            if e.neurons.iter().any(|&id| id >= n) {
                return Err(invalid("ENGR references unknown neuron"));
            }
        }

        let mut prediction_mgr = PredictionManager::new(&layout, cfg.prediction_rate, cfg.prediction_noise);
        if let Some((vectors, errors)) = prediction {
            let shape_ok = vectors.len() == layout.topology().len()
                && vectors
                    .iter()
                    .zip(layout.topology())
                    .all(|(v, &len)| v.len() == len);
            if !shape_ok {
                return Err(invalid("PRED shape mismatch"));
            }
            prediction_mgr.restore(stat.predictive_mode, vectors, errors);
        } else if stat.predictive_mode {
            return Err(missing("PRED"));
        }

        let mut engram_mgr = EngramManager::new(&cfg);
        engram_mgr.restore(engrams, stat.next_auto, stat.next_local);
        engram_mgr.set_detection_active(stat.engram_detection);

        let mut competition = CompetitionManager::new(cfg.competition_window, cfg.disuse_window);
        competition.set_active(stat.resource_competition);

        Ok(Self {
            hebbian: HebbianTrainer::new(cfg.hebbian_window, cfg.learning_rate),
            cfg,
            layout,
            density: stat.density,
            neurons,
            synapses,
            clock: stat.clock,
            state: stat.state,
            rng: Prng::from_state(rng_state),
            competition,
            engrams: engram_mgr,
            prediction: prediction_mgr,
            pruned_last_round: stat.pruned_last_round,
            last_competition: stat.last_competition,
        })
    }

    pub fn save_image_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.save_image_to(&mut out)?;
        Ok(out)
    }

    pub fn load_image_bytes(bytes: &[u8]) -> io::Result<Self> {
        Self::load_image_from(&mut Cursor::new(bytes))
    }

    /// Exact serialized size in bytes for the current image.
    pub fn image_size_bytes(&self) -> io::Result<usize> {
        let mut cw = CountingWriter::new();
        self.save_image_to(&mut cw)?;
        Ok(cw.written())
    }

    fn write_stat_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let (next_auto, next_local) = self.engrams.counters();
        write_u64_le(w, self.clock)?;
        write_u32_le(w, u32::from(self.state.to_u8()))?;
        write_f32_le(w, self.density)?;
        write_bool(w, self.engrams.is_detection_active())?;
        write_bool(w, self.prediction.is_active())?;
        write_bool(w, self.competition.is_active())?;
        write_len(w, self.pruned_last_round)?;
        write_u64_le(w, next_auto)?;
        write_u64_le(w, next_local)?;
        write_u64_le(w, self.last_competition)
    }

    fn write_neuron_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let topo = self.layout.topology();
        write_len(w, topo.len())?;
        for &size in topo {
            write_len(w, size)?;
        }

        write_len(w, self.neurons.len())?;
        for n in &self.neurons {
            write_u32_le(w, u32::from(n.role.to_u8()))?;
            write_f32_le(w, n.stored_value)?;
            write_u32_le(w, u32::from(n.potential.to_u8()))?;
            write_bool(w, n.active)?;
            write_f32_le(w, n.resources)?;
            write_f32_le(w, n.survival)?;
            write_u64_le(w, n.last_activation)?;
            write_u64_le(w, n.activation_count)?;
            write_f32_le(w, n.facilitation)?;
            write_f32_le(w, n.accumulated)?;
            write_u32_le(w, n.pending_inputs)?;
            write_len(w, n.neighbors.len())?;
            for &id in &n.neighbors {
                write_len(w, id)?;
            }
        }
        Ok(())
    }

    fn write_synapse_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_len(w, self.synapses.len())?;
        for s in &self.synapses {
            write_u32_le(w, s.id.0)?;
            write_u32_le(w, u32::from(s.direction.to_u8()))?;
            write_u32_le(w, u32::from(s.kind.to_u8()))?;
            write_len(w, s.pre)?;
            write_len(w, s.targets().len())?;
            for &t in s.targets() {
                write_len(w, t)?;
            }
            write_f32_le(w, s.weight)?;
            write_f32_le(w, s.resources)?;
            write_u64_le(w, s.last_activation)?;
            write_u64_le(w, s.co_activation_count)?;
            write_f32_le(w, s.reinforcement_rate)?;
        }
        Ok(())
    }

    fn write_engram_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_len(w, self.engrams.len())?;
        for e in self.engrams.iter() {
            write_string(w, &e.id)?;
            write_len(w, e.neurons.len())?;
            for &id in &e.neurons {
                write_len(w, id)?;
            }
            write_len(w, e.synapses.len())?;
            for sid in &e.synapses {
                write_u32_le(w, sid.0)?;
            }
            write_f32_le(w, e.strength)?;
            write_f32_le(w, e.relevance)?;
            write_u64_le(w, e.activation_count)?;
            write_u64_le(w, e.creation_time)?;
            write_u64_le(w, e.last_activation)?;
        }
        Ok(())
    }

    fn write_prediction_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let vectors = self.prediction.predictions();
        write_len(w, vectors.len())?;
        for v in vectors {
            write_f32_vec(w, v)?;
        }
        write_f32_vec(w, self.prediction.last_errors())
    }
}

fn write_f32_vec<W: Write>(w: &mut W, v: &[f32]) -> io::Result<()> {
    write_len(w, v.len())?;
    for &x in v {
        write_f32_le(w, x)?;
    }
    Ok(())
}

/// Read an `f32` and reject it unless it lies in `range`. NaN never does.
fn read_f32_in<R: Read>(
    r: &mut R,
    range: RangeInclusive<f32>,
    what: &'static str,
) -> io::Result<f32> {
    let v = read_f32_le(r)?;
    if range.contains(&v) {
        Ok(v)
    } else {
        Err(invalid(what))
    }
}

fn read_f32_vec<R: Read>(
    r: &mut R,
    range: RangeInclusive<f32>,
    what: &'static str,
) -> io::Result<Vec<f32>> {
    let n = read_len(r)?;
    let mut out = Vec::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        out.push(read_f32_in(r, range.clone(), what)?);
    }
    Ok(out)
}

fn write_cfg_payload<W: Write>(w: &mut W, cfg: &NetworkConfig) -> io::Result<()> {
    write_f32_le(w, cfg.base_threshold)?;
    write_f32_le(w, cfg.input_activation_threshold)?;
    write_f32_le(w, cfg.feedback_gain)?;
    write_f32_le(w, cfg.reinforcement_rate)?;
    write_u64_le(w, cfg.hebbian_window)?;
    write_f32_le(w, cfg.learning_rate)?;
    write_u64_le(w, cfg.competition_window)?;
    write_u64_le(w, cfg.competition_interval)?;
    write_u64_le(w, cfg.disuse_window)?;
    write_f32_le(w, cfg.engram_activation_threshold)?;
    write_f32_le(w, cfg.engram_threshold_jitter)?;
    write_f32_le(w, cfg.global_overlap)?;
    write_f32_le(w, cfg.local_overlap)?;
    write_f32_le(w, cfg.engram_reinforce_rate)?;
    write_u64_le(w, cfg.recent_engram_window)?;
    write_f32_le(w, cfg.relevance_floor)?;
    write_f32_le(w, cfg.consolidation_factor)?;
    write_f32_le(w, cfg.prediction_rate)?;
    write_f32_le(w, cfg.prediction_noise)?;
    write_f32_le(w, cfg.multi_target_probability)?;
    write_f32_le(w, cfg.electric_probability)?;
    write_f32_le(w, cfg.forward_weight_min)?;
    write_f32_le(w, cfg.forward_weight_max)?;
    write_f32_le(w, cfg.feedback_weight_min)?;
    write_f32_le(w, cfg.feedback_weight_max)?;
    write_bool(w, cfg.engram_detection)?;
    write_bool(w, cfg.predictive_mode)?;
    write_bool(w, cfg.resource_competition)?;
    write_bool(w, cfg.seed.is_some())?;
    write_u64_le(w, cfg.seed.unwrap_or(0))
}

fn read_cfg_payload<R: Read>(r: &mut R) -> io::Result<NetworkConfig> {
    let base_threshold = read_f32_le(r)?;
    let input_activation_threshold = read_f32_le(r)?;
    let feedback_gain = read_f32_le(r)?;
    let reinforcement_rate = read_f32_le(r)?;
    let hebbian_window = read_u64_le(r)?;
    let learning_rate = read_f32_le(r)?;
    let competition_window = read_u64_le(r)?;
    let competition_interval = read_u64_le(r)?;
    let disuse_window = read_u64_le(r)?;
    let engram_activation_threshold = read_f32_le(r)?;
    let engram_threshold_jitter = read_f32_le(r)?;
    let global_overlap = read_f32_le(r)?;
    let local_overlap = read_f32_le(r)?;
    let engram_reinforce_rate = read_f32_le(r)?;
    let recent_engram_window = read_u64_le(r)?;
    let relevance_floor = read_f32_le(r)?;
    let consolidation_factor = read_f32_le(r)?;
    let prediction_rate = read_f32_le(r)?;
    let prediction_noise = read_f32_le(r)?;
    let multi_target_probability = read_f32_le(r)?;
    let electric_probability = read_f32_le(r)?;
    let forward_weight_min = read_f32_le(r)?;
    let forward_weight_max = read_f32_le(r)?;
    let feedback_weight_min = read_f32_le(r)?;
    let feedback_weight_max = read_f32_le(r)?;
    let engram_detection = read_bool(r)?;
    let predictive_mode = read_bool(r)?;
    let resource_competition = read_bool(r)?;
    let seed_present = read_bool(r)?;
    let seed = read_u64_le(r)?;

    let cfg = NetworkConfig {
        base_threshold,
        input_activation_threshold,
        feedback_gain,
        reinforcement_rate,
        hebbian_window,
        learning_rate,
        competition_window,
        competition_interval,
        disuse_window,
        engram_activation_threshold,
        engram_threshold_jitter,
        global_overlap,
        local_overlap,
        engram_reinforce_rate,
        recent_engram_window,
        relevance_floor,
        consolidation_factor,
        prediction_rate,
        prediction_noise,
        multi_target_probability,
        electric_probability,
        forward_weight_min,
        forward_weight_max,
        feedback_weight_min,
        feedback_weight_max,
        engram_detection,
        predictive_mode,
        resource_competition,
        seed: seed_present.then_some(seed),
    };
    cfg.validate().map_err(invalid)?;
    Ok(cfg)
}

fn read_stat_payload<R: Read>(r: &mut R) -> io::Result<Stat> {
    let clock = read_u64_le(r)?;
    let state = u8::try_from(read_u32_le(r)?)
        .ok()
        .and_then(NetworkState::from_u8)
        .ok_or_else(|| invalid("bad network state"))?;
    Ok(Stat {
        clock,
        state,
        density: read_f32_in(r, UNIT, "density out of range")?,
        engram_detection: read_bool(r)?,
        predictive_mode: read_bool(r)?,
        resource_competition: read_bool(r)?,
        pruned_last_round: read_len(r)?,
        next_auto: read_u64_le(r)?,
        next_local: read_u64_le(r)?,
        last_competition: read_u64_le(r)?,
    })
}

fn read_code<R: Read, T>(r: &mut R, decode: fn(u8) -> Option<T>, what: &'static str) -> io::Result<T> {
    u8::try_from(read_u32_le(r)?)
        .ok()
        .and_then(decode)
        .ok_or_else(|| invalid(what))
}

fn read_neuron_payload<R: Read>(r: &mut R) -> io::Result<(Layout, Vec<Neuron>)> {
    let layers = read_len(r)?;
    let mut topology = Vec::with_capacity(layers.min(64));
    for _ in 0..layers {
        topology.push(read_len(r)?);
    }
    let layout = Layout::from_topology(&topology).map_err(invalid)?;

    let count = read_len(r)?;
    let mut neurons = Vec::with_capacity(count.min(1 << 16));
    for id in 0..count {
        let role: NeuronRole = read_code(r, NeuronRole::from_u8, "bad neuron role")?;
        if layout.role_of(id) != Some(role) {
            return Err(invalid("neuron role does not match layout"));
        }
        let stored_value = read_f32_in(r, SIGNED_UNIT, "neuron value out of range")?;
        let potential: Potential = read_code(r, Potential::from_u8, "bad potential")?;
        let active = read_bool(r)?;
        let resources = read_f32_in(r, UNIT, "neuron resources out of range")?;
        let survival = read_f32_in(r, UNIT, "neuron survival out of range")?;
        let last_activation = read_u64_le(r)?;
        let activation_count = read_u64_le(r)?;
        let facilitation = read_f32_in(r, 0.0..=FACILITATION_MAX, "facilitation out of range")?;
        let accumulated = read_f32_in(r, FINITE, "accumulated input not finite")?;
        let pending_inputs = read_u32_le(r)?;
        let nb = read_len(r)?;
        let mut neighbors = Vec::with_capacity(nb.min(1 << 16));
        for _ in 0..nb {
            neighbors.push(read_len(r)?);
        }
        neurons.push(Neuron {
            id,
            role,
            stored_value,
            potential,
            active,
            resources,
            survival,
            last_activation,
            activation_count,
            facilitation,
            accumulated,
            pending_inputs,
            neighbors,
        });
    }
    Ok((layout, neurons))
}

fn read_synapse_payload<R: Read>(r: &mut R) -> io::Result<Vec<Synapse>> {
    let count = read_len(r)?;
    let mut synapses = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        let id = SynapseId(read_u32_le(r)?);
        let direction: Direction = read_code(r, Direction::from_u8, "bad synapse direction")?;
        let kind: SynapseKind = read_code(r, SynapseKind::from_u8, "bad synapse kind")?;
        let pre = read_len(r)?;
        let tn = read_len(r)?;
        let mut ids = Vec::with_capacity(tn.min(8));
        for _ in 0..tn {
            ids.push(read_len(r)?);
        }
        let targets = Targets::from_slice(&ids).ok_or_else(|| invalid("bad synapse targets"))?;
        synapses.push(Synapse {
            id,
            direction,
            kind,
            pre,
            targets,
            weight: read_f32_in(r, SIGNED_UNIT, "synapse weight out of range")?,
            resources: read_f32_in(r, UNIT, "synapse resources out of range")?,
            last_activation: read_u64_le(r)?,
            co_activation_count: read_u64_le(r)?,
            reinforcement_rate: read_f32_in(r, NON_NEGATIVE, "bad reinforcement rate")?,
        });
    }
    Ok(synapses)
}

fn read_engram_payload<R: Read>(r: &mut R) -> io::Result<Vec<Engram>> {
    let count = read_len(r)?;
    let mut engrams = Vec::with_capacity(count.min(1 << 12));
    for _ in 0..count {
        let id = read_string(r)?;
        let mut e = Engram::new(id, 0);
        for _ in 0..read_len(r)? {
            e.add_neuron(read_len(r)?);
        }
        for _ in 0..read_len(r)? {
            e.add_connection(SynapseId(read_u32_le(r)?));
        }
        e.strength = read_f32_in(r, UNIT, "engram strength out of range")?;
        e.relevance = read_f32_in(r, 0.0..=MAX_RELEVANCE, "engram relevance out of range")?;
        e.activation_count = read_u64_le(r)?;
        e.creation_time = read_u64_le(r)?;
        e.last_activation = read_u64_le(r)?;
        engrams.push(e);
    }
    Ok(engrams)
}

fn read_prediction_payload<R: Read>(r: &mut R) -> io::Result<(Vec<Vec<f32>>, Vec<f32>)> {
    let layers = read_len(r)?;
    let mut vectors = Vec::with_capacity(layers.min(64));
    for _ in 0..layers {
        vectors.push(read_f32_vec(r, FINITE, "prediction not finite")?);
    }
    let errors = read_f32_vec(r, FINITE, "prediction error not finite")?;
    Ok((vectors, errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained_network() -> Network {
        let cfg = NetworkConfig::default()
            .with_seed(21)
            .with_engram_detection(true)
            .with_predictive_mode(true)
            .with_resource_competition(true);
        let mut net = Network::with_config(&[3, 5, 4, 2], 0.8, cfg).unwrap();
        for i in 0..12 {
            let x = [1.0, if i % 2 == 0 { 0.8 } else { -0.6 }, 0.3];
            net.train(&x, &[1.0, -0.5], 4).unwrap();
        }
        net.form_engram("manual", &[3, 4, 9]).unwrap();
        net.run_competition();
        net
    }

    #[test]
    fn image_roundtrip_preserves_everything() {
        let net = trained_network();
        let bytes = net.save_image_bytes().unwrap();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(bytes.len(), net.image_size_bytes().unwrap());

        let loaded = Network::load_image_bytes(&bytes).unwrap();
        assert_eq!(loaded.config(), net.config());
        assert_eq!(loaded.layout(), net.layout());
        assert_eq!(loaded.clock(), net.clock());
        assert_eq!(loaded.state(), net.state());
        assert_eq!(loaded.neurons(), net.neurons());
        assert_eq!(loaded.synapses(), net.synapses());
        assert!(loaded.engrams().eq(net.engrams()));
        assert_eq!(loaded.predictions(), net.predictions());
        assert_eq!(loaded.prediction_errors(), net.prediction_errors());
        assert_eq!(loaded.rng, net.rng);
        assert_eq!(loaded.last_competition, net.last_competition);
        assert_eq!(loaded.diagnostics(), net.diagnostics());
        assert!(loaded.is_engram_detection());
        assert!(loaded.is_predictive_mode());
        assert!(loaded.is_resource_competition());
    }

    #[test]
    fn reloaded_network_continues_identically() {
        let mut a = trained_network();
        let mut b = Network::load_image_bytes(&a.save_image_bytes().unwrap()).unwrap();
        for _ in 0..5 {
            let x = [0.7, -0.2, 0.9];
            assert_eq!(a.process(&x).unwrap(), b.process(&x).unwrap());
            a.train(&x, &[0.0, 1.0], 2).unwrap();
            b.train(&x, &[0.0, 1.0], 2).unwrap();
        }
        assert_eq!(a.synapses(), b.synapses());
        assert_eq!(a.engram_count(), b.engram_count());
    }

    #[test]
    fn consolidating_state_survives_roundtrip() {
        let mut net = Network::new(&[2, 2], 1.0).unwrap();
        net.start_consolidation().unwrap();
        let loaded = Network::load_image_bytes(&net.save_image_bytes().unwrap()).unwrap();
        assert_eq!(loaded.state(), NetworkState::Consolidating);
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let net = Network::new(&[2, 3, 1], 0.5).unwrap();
        let mut bytes = net.save_image_bytes().unwrap();
        write_chunk_lz4(&mut bytes, *b"XTRA", b"future payload").unwrap();
        let loaded = Network::load_image_bytes(&bytes).unwrap();
        assert_eq!(loaded.synapses(), net.synapses());
    }

    #[test]
    fn bad_images_are_rejected() {
        let net = Network::new(&[2, 3, 1], 0.5).unwrap();
        let bytes = net.save_image_bytes().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        let err = Network::load_image_bytes(&bad_magic).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        // Header only: every chunk is missing.
        let err = Network::load_image_bytes(&bytes[..12]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        // Truncated inside a chunk.
        assert!(Network::load_image_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    fn load_err(net: &Network) -> io::Error {
        let bytes = net.save_image_bytes().unwrap();
        Network::load_image_bytes(&bytes).unwrap_err()
    }

    #[test]
    fn out_of_range_state_is_rejected() {
        let base = Network::new(&[2, 3, 1], 1.0).unwrap();

        let mut net = base.clone();
        net.neurons[1].stored_value = f32::NAN;
        assert_eq!(load_err(&net).kind(), io::ErrorKind::InvalidData);

        let mut net = base.clone();
        net.neurons[2].resources = 1.5;
        assert_eq!(load_err(&net).kind(), io::ErrorKind::InvalidData);

        let mut net = base.clone();
        net.synapses[0].weight = -1.2;
        assert_eq!(load_err(&net).kind(), io::ErrorKind::InvalidData);

        let mut net = base.clone();
        net.synapses[0].resources = f32::INFINITY;
        assert_eq!(load_err(&net).kind(), io::ErrorKind::InvalidData);

        // A later ENGR chunk replaces the valid one; its strength is 2.0.
        let mut bytes = base.save_image_bytes().unwrap();
        let mut payload = Vec::new();
        write_len(&mut payload, 1).unwrap();
        write_string(&mut payload, "e").unwrap();
        write_len(&mut payload, 1).unwrap();
        write_len(&mut payload, 0).unwrap();
        write_len(&mut payload, 0).unwrap();
        write_f32_le(&mut payload, 2.0).unwrap();
        write_f32_le(&mut payload, 1.0).unwrap();
        for _ in 0..3 {
            write_u64_le(&mut payload, 0).unwrap();
        }
        write_chunk_lz4(&mut bytes, TAG_ENGRAMS, &payload).unwrap();
        let err = Network::load_image_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        assert!(Network::load_image_bytes(&base.save_image_bytes().unwrap()).is_ok());
    }

    #[test]
    fn oversized_chunk_is_rejected_before_decompression() {
        let net = Network::new(&[2, 3, 1], 0.5).unwrap();
        let mut bytes = net.save_image_bytes().unwrap();
        bytes.extend_from_slice(b"XTRA");
        write_u32_le(&mut bytes, 8).unwrap();
        write_u32_le(&mut bytes, u32::MAX).unwrap();
        bytes.extend_from_slice(&[0u8; 4]);
        let err = Network::load_image_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn counting_writer_counts() {
        let mut cw = CountingWriter::new();
        cw.write_all(b"abcd").unwrap();
        write_u64_le(&mut cw, 7).unwrap();
        assert_eq!(cw.written(), 12);
    }
}
