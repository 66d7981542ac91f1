//! Object table, routing graph and mixer of the stand-in engine.

use dasp_graph::Buffer;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{self, Incoming, Outgoing};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, trace};

use crate::dsp::{ConnectionType, DspType, MixMatrix, ParameterDesc, ParameterKind, ParameterValue};
use crate::engine::REVERB_INSTANCES;
use crate::format::{ChannelFormat, SpeakerMode};
use crate::handle::NativeHandle;
use crate::proxy::ProxyKind;
use crate::sys::{NativeResult, RawParameterDesc, RawReverbProperties, ResultCode, SystemSettings};

use super::processor::{ParameterSpec, ProcessContext, Processor, SimProcessor};
use super::SimConfig;

const HANDLE_BASE: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;

pub(crate) struct SimNode {
    pub handle: NativeHandle,
    pub dsp_type: DspType,
    pub processor: SimProcessor,
    pub format: ChannelFormat,
    pub active: bool,
    pub bypass: bool,
    pub metering: (bool, bool),
    /// Output of the last execution.
    pub output: Vec<Buffer>,
    /// Sum of sidechain inputs at the last execution.
    pub sidechain: Vec<Buffer>,
    /// Tick of the last execution, 0 if never run.
    pub last_tick: u64,
    pub executions: u64,
}

/// Edge weight. `seq` keeps positional queries in insertion order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SimEdge {
    pub connection: NativeHandle,
    pub kind: ConnectionType,
    pub seq: u64,
}

pub(crate) struct SimConnection {
    /// `None` once disconnected.
    pub edge: Option<EdgeIndex>,
    pub input: NativeHandle,
    pub output: NativeHandle,
    pub kind: ConnectionType,
    pub mix: f32,
    pub matrix: Option<MixMatrix>,
    /// Set by the mixer when it drains the command queue.
    pub established: bool,
    /// The binding dropped its reference; free the handle once detached.
    pub released: bool,
}

pub(crate) enum SimObject {
    Dsp(NodeIndex),
    Connection(SimConnection),
}

pub(crate) struct SimState {
    config: SimConfig,
    settings: Option<SystemSettings>,
    next_handle: usize,
    free_handles: Vec<NativeHandle>,
    objects: HashMap<NativeHandle, SimObject>,
    graph: StableGraph<SimNode, SimEdge>,
    next_seq: u64,
    strings: Vec<&'static str>,
    reverbs: [RawReverbProperties; REVERB_INSTANCES as usize],
    master: NativeHandle,
    tick: u64,
    release_counts: HashMap<NativeHandle, u32>,
    locked: bool,
    pending_tx: Option<Producer<NativeHandle>>,
    pending_rx: Option<Consumer<NativeHandle>>,
}

impl SimState {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            settings: None,
            next_handle: HANDLE_BASE,
            free_handles: Vec::new(),
            objects: HashMap::new(),
            graph: StableGraph::new(),
            next_seq: 0,
            strings: Vec::new(),
            reverbs: [RawReverbProperties::default(); REVERB_INSTANCES as usize],
            master: NativeHandle::NULL,
            tick: 0,
            release_counts: HashMap::new(),
            locked: false,
            pending_tx: None,
            pending_rx: None,
        }
    }

    // --- system ---

    pub fn init(&mut self, settings: &SystemSettings) -> NativeResult<()> {
        if self.settings.is_some() {
            return Err(ResultCode::Initialized);
        }
        if settings.max_channels == 0 || settings.sample_rate == 0 {
            return Err(ResultCode::InvalidParam);
        }

        let (tx, rx) = RingBuffer::new(settings.command_queue_size.max(1));
        self.pending_tx = Some(tx);
        self.pending_rx = Some(rx);
        self.settings = Some(*settings);
        self.master = self.create_dsp(DspType::Mixer)?;
        debug!(master = %self.master, "stand-in engine initialised");
        Ok(())
    }

    pub fn close(&mut self) -> NativeResult<()> {
        self.settings()?;
        let config = self.config.clone();
        let release_counts = core::mem::take(&mut self.release_counts);
        *self = Self::new(config);
        self.release_counts = release_counts;
        debug!("stand-in engine closed");
        Ok(())
    }

    pub fn settings(&self) -> NativeResult<&SystemSettings> {
        self.settings.as_ref().ok_or(ResultCode::Uninitialized)
    }

    pub fn master(&self) -> NativeResult<NativeHandle> {
        self.settings()?;
        Ok(self.master)
    }

    pub fn speaker_mode(&self) -> NativeResult<SpeakerMode> {
        Ok(self.settings()?.speaker_mode)
    }

    pub fn lock(&mut self) -> NativeResult<()> {
        self.settings()?;
        if self.locked {
            return Err(ResultCode::AlreadyLocked);
        }
        self.locked = true;
        Ok(())
    }

    pub fn unlock(&mut self) -> NativeResult<()> {
        if !self.locked {
            return Err(ResultCode::NotLocked);
        }
        self.locked = false;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn string(&self, token: u32) -> NativeResult<String> {
        let index = (token as usize).checked_sub(1).ok_or(ResultCode::InvalidParam)?;
        self.strings.get(index).map(|s| s.to_string()).ok_or(ResultCode::InvalidParam)
    }

    fn intern(&mut self, text: &'static str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let index = match self.strings.iter().position(|s| *s == text) {
            Some(index) => index,
            None => {
                self.strings.push(text);
                self.strings.len() - 1
            }
        };
        index as u32 + 1
    }

    pub fn set_reverb(&mut self, instance: i32, props: &RawReverbProperties) -> NativeResult<()> {
        self.settings()?;
        let slot = usize::try_from(instance)
            .ok()
            .and_then(|i| self.reverbs.get_mut(i))
            .ok_or(ResultCode::ReverbInstance)?;
        *slot = *props;
        Ok(())
    }

    pub fn reverb(&self, instance: i32) -> NativeResult<RawReverbProperties> {
        self.settings()?;
        usize::try_from(instance)
            .ok()
            .and_then(|i| self.reverbs.get(i))
            .copied()
            .ok_or(ResultCode::ReverbInstance)
    }

    // --- handles and lookup ---

    fn alloc_handle(&mut self) -> NativeHandle {
        if self.config.recycle_handles {
            if let Some(handle) = self.free_handles.pop() {
                return handle;
            }
        }
        let handle = NativeHandle::from_raw(self.next_handle);
        self.next_handle += HANDLE_STRIDE;
        handle
    }

    fn free_handle(&mut self, handle: NativeHandle) {
        self.objects.remove(&handle);
        if self.config.recycle_handles {
            self.free_handles.push(handle);
        }
    }

    pub fn object_kind(&self, handle: NativeHandle) -> NativeResult<ProxyKind> {
        match self.objects.get(&handle) {
            Some(SimObject::Dsp(_)) => Ok(ProxyKind::Dsp),
            Some(SimObject::Connection(_)) => Ok(ProxyKind::DspConnection),
            None => Err(ResultCode::InvalidHandle),
        }
    }

    fn node_index(&self, handle: NativeHandle) -> NativeResult<NodeIndex> {
        match self.objects.get(&handle) {
            Some(SimObject::Dsp(idx)) => Ok(*idx),
            _ => Err(ResultCode::InvalidHandle),
        }
    }

    pub fn node(&self, handle: NativeHandle) -> NativeResult<&SimNode> {
        let idx = self.node_index(handle)?;
        self.graph.node_weight(idx).ok_or(ResultCode::Internal)
    }

    pub fn node_mut(&mut self, handle: NativeHandle) -> NativeResult<&mut SimNode> {
        let idx = self.node_index(handle)?;
        self.graph.node_weight_mut(idx).ok_or(ResultCode::Internal)
    }

    pub fn connection(&self, handle: NativeHandle) -> NativeResult<&SimConnection> {
        match self.objects.get(&handle) {
            Some(SimObject::Connection(c)) => Ok(c),
            _ => Err(ResultCode::InvalidHandle),
        }
    }

    fn connection_mut(&mut self, handle: NativeHandle) -> NativeResult<&mut SimConnection> {
        match self.objects.get_mut(&handle) {
            Some(SimObject::Connection(c)) => Ok(c),
            _ => Err(ResultCode::InvalidHandle),
        }
    }

    fn is_established(&self, connection: NativeHandle) -> bool {
        self.connection(connection).map_or(false, |c| c.established)
    }

    // --- nodes ---

    pub fn create_dsp(&mut self, dsp_type: DspType) -> NativeResult<NativeHandle> {
        let settings = *self.settings()?;
        let processor = SimProcessor::for_type(dsp_type).ok_or(ResultCode::DspType)?;
        let format = match dsp_type {
            DspType::Oscillator => ChannelFormat::mono(),
            _ => ChannelFormat::for_mode(settings.speaker_mode),
        };
        let channels = format.channels.max(1) as usize;

        let handle = self.alloc_handle();
        let idx = self.graph.add_node(SimNode {
            handle,
            dsp_type,
            processor,
            format,
            active: true,
            bypass: false,
            metering: (false, false),
            output: vec![Buffer::SILENT; channels],
            sidechain: Vec::new(),
            last_tick: 0,
            executions: 0,
        });
        self.objects.insert(handle, SimObject::Dsp(idx));
        debug!(%handle, ?dsp_type, "stand-in created DSP");
        Ok(handle)
    }

    pub fn release_dsp(&mut self, handle: NativeHandle) -> NativeResult<()> {
        let idx = self.node_index(handle)?;
        *self.release_counts.entry(handle).or_default() += 1;
        if handle == self.master {
            // the master belongs to the system; only the binding goes away
            return Ok(());
        }

        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Incoming)
            .chain(self.graph.edges_directed(idx, Outgoing))
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.detach(edge);
        }
        self.graph.remove_node(idx);
        self.free_handle(handle);
        debug!(%handle, "stand-in released DSP");
        Ok(())
    }

    /// Positional edges of a node, oldest first.
    fn ordered_edges(&self, idx: NodeIndex, dir: Direction) -> Vec<EdgeIndex> {
        self.graph
            .edges_directed(idx, dir)
            .sorted_by_key(|e| e.weight().seq)
            .map(|e| e.id())
            .collect()
    }

    pub fn edge_count(&self, dsp: NativeHandle, dir: Direction) -> NativeResult<usize> {
        let idx = self.node_index(dsp)?;
        Ok(self.graph.edges_directed(idx, dir).count())
    }

    /// `(other node, connection)` at `index` in direction `dir`.
    pub fn edge_at(
        &self,
        dsp: NativeHandle,
        dir: Direction,
        index: usize,
    ) -> NativeResult<(NativeHandle, NativeHandle)> {
        let idx = self.node_index(dsp)?;
        let edge = *self.ordered_edges(idx, dir).get(index).ok_or(ResultCode::InvalidParam)?;
        let connection = self.graph[edge].connection;
        if !self.is_established(connection) {
            return Err(ResultCode::NotReady);
        }
        let (source, target) = self.graph.edge_endpoints(edge).ok_or(ResultCode::Internal)?;
        let other = match dir {
            Incoming => source,
            Outgoing => target,
        };
        Ok((self.graph[other].handle, connection))
    }

    pub fn add_input(
        &mut self,
        dsp: NativeHandle,
        input: NativeHandle,
        kind: ConnectionType,
    ) -> NativeResult<NativeHandle> {
        let target = self.node_index(dsp)?;
        let source = self.node_index(input)?;
        // input -> dsp closes a loop if dsp already reaches input
        if source == target || has_path_connecting(&self.graph, target, source, None) {
            return Err(ResultCode::DspConnection);
        }

        let handle = self.alloc_handle();
        let seq = self.next_seq;
        self.next_seq += 1;
        let edge = self.graph.add_edge(source, target, SimEdge { connection: handle, kind, seq });

        let established = !self.config.deferred_connections;
        if !established {
            let queued = self.pending_tx.as_mut().map_or(false, |tx| tx.push(handle).is_ok());
            if !queued {
                self.graph.remove_edge(edge);
                self.free_handle(handle);
                return Err(ResultCode::Memory);
            }
        }

        self.objects.insert(
            handle,
            SimObject::Connection(SimConnection {
                edge: Some(edge),
                input,
                output: dsp,
                kind,
                mix: 1.0,
                matrix: None,
                established,
                released: false,
            }),
        );
        debug!(%dsp, %input, connection = %handle, ?kind, established, "stand-in added input");
        Ok(handle)
    }

    /// Remove an edge and leave its connection object dangling with null endpoints.
    fn detach(&mut self, edge: EdgeIndex) {
        let Some(weight) = self.graph.remove_edge(edge) else {
            return;
        };
        let handle = weight.connection;
        let released = match self.connection_mut(handle) {
            Ok(c) => {
                c.edge = None;
                c.input = NativeHandle::NULL;
                c.output = NativeHandle::NULL;
                c.released
            }
            Err(_) => false,
        };
        if released {
            self.free_handle(handle);
        }
    }

    pub fn disconnect_from(
        &mut self,
        dsp: NativeHandle,
        target: NativeHandle,
        connection: NativeHandle,
    ) -> NativeResult<()> {
        let a = self.node_index(dsp)?;
        let b = self.node_index(target)?;
        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(a, Outgoing)
            .filter(|e| e.target() == b)
            .chain(self.graph.edges_directed(a, Incoming).filter(|e| e.source() == b))
            .filter(|e| connection.is_null() || e.weight().connection == connection)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.detach(edge);
        }
        Ok(())
    }

    pub fn disconnect_all(
        &mut self,
        dsp: NativeHandle,
        inputs: bool,
        outputs: bool,
    ) -> NativeResult<()> {
        let idx = self.node_index(dsp)?;
        let mut edges = Vec::new();
        if inputs {
            edges.extend(self.graph.edges_directed(idx, Incoming).map(|e| e.id()));
        }
        if outputs {
            edges.extend(self.graph.edges_directed(idx, Outgoing).map(|e| e.id()));
        }
        for edge in edges {
            self.detach(edge);
        }
        Ok(())
    }

    // --- parameters ---

    fn parameter_spec(&self, dsp: NativeHandle, index: usize) -> NativeResult<ParameterSpec> {
        self.node(dsp)?
            .processor
            .parameters()
            .get(index)
            .copied()
            .ok_or(ResultCode::InvalidParam)
    }

    pub fn parameter_count(&self, dsp: NativeHandle) -> NativeResult<usize> {
        Ok(self.node(dsp)?.processor.parameters().len())
    }

    pub fn parameter_info(
        &mut self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<RawParameterDesc> {
        let spec = self.parameter_spec(dsp, index)?;
        let token = self.intern(spec.description);
        let desc = ParameterDesc {
            name: spec.name.to_string(),
            label: spec.label.to_string(),
            description: spec.description.to_string(),
            shape: spec.shape,
        };
        Ok(desc.encode(token))
    }

    pub fn parameter(
        &self,
        dsp: NativeHandle,
        index: usize,
        kind: ParameterKind,
    ) -> NativeResult<ParameterValue> {
        let spec = self.parameter_spec(dsp, index)?;
        if spec.shape.kind() != kind {
            return Err(ResultCode::InvalidParam);
        }
        Ok(self.node(dsp)?.processor.parameter(index))
    }

    pub fn set_parameter(
        &mut self,
        dsp: NativeHandle,
        index: usize,
        value: ParameterValue,
    ) -> NativeResult<()> {
        let spec = self.parameter_spec(dsp, index)?;
        let value = spec.shape.clamp(index, value).map_err(|_| ResultCode::InvalidParam)?;
        let node = self.node_mut(dsp)?;
        node.processor.set_parameter(index, &value)?;

        if let SimProcessor::ChannelMix(mix) = &node.processor {
            if let Some(mode) = mix.grouping_mode() {
                node.format = ChannelFormat::for_mode(mode);
            }
        }
        Ok(())
    }

    // --- format ---

    pub fn set_channel_format(
        &mut self,
        dsp: NativeHandle,
        format: &ChannelFormat,
    ) -> NativeResult<()> {
        let max = self.settings()?.max_channels;
        if format.channels == 0 || format.channels > max {
            return Err(ResultCode::InvalidParam);
        }
        if format.speaker_mode.channels().is_some_and(|n| n != format.channels) {
            return Err(ResultCode::InvalidSpeaker);
        }
        self.node_mut(dsp)?.format = *format;
        Ok(())
    }

    pub fn output_channel_format(
        &self,
        dsp: NativeHandle,
        input: &ChannelFormat,
    ) -> NativeResult<ChannelFormat> {
        let node = self.node(dsp)?;
        Ok(node.processor.output_format(&node.format, input))
    }

    // --- connections ---

    pub fn release_connection(&mut self, handle: NativeHandle) -> NativeResult<()> {
        let connection = self.connection_mut(handle)?;
        connection.released = true;
        let detached = connection.edge.is_none();
        *self.release_counts.entry(handle).or_default() += 1;
        if detached {
            self.free_handle(handle);
        }
        Ok(())
    }

    /// Endpoint of a connection, `NULL` once disconnected.
    pub fn connection_endpoint(
        &self,
        handle: NativeHandle,
        dir: Direction,
    ) -> NativeResult<NativeHandle> {
        let connection = self.connection(handle)?;
        if !connection.established {
            return Err(ResultCode::NotReady);
        }
        Ok(match dir {
            Incoming => connection.input,
            Outgoing => connection.output,
        })
    }

    pub fn set_mix(&mut self, handle: NativeHandle, volume: f32) -> NativeResult<()> {
        if !volume.is_finite() {
            return Err(ResultCode::InvalidFloat);
        }
        self.connection_mut(handle)?.mix = volume;
        Ok(())
    }

    /// `(rows, cols)` of a connection's matrix: output by input channels.
    fn matrix_dims(&self, connection: &SimConnection) -> NativeResult<(usize, usize)> {
        if !connection.established {
            return Err(ResultCode::NotReady);
        }
        if connection.edge.is_none() {
            return Err(ResultCode::DspNotFound);
        }
        let rows = self.node(connection.output)?.format.channels as usize;
        let cols = self.node(connection.input)?.format.channels as usize;
        Ok((rows, cols))
    }

    pub fn mix_matrix(
        &self,
        handle: NativeHandle,
        out: Option<&mut [f32]>,
        hop: usize,
    ) -> NativeResult<(usize, usize)> {
        let connection = self.connection(handle)?;
        let (rows, cols) = self.matrix_dims(connection)?;
        if let Some(buf) = out {
            let hop = if hop == 0 { cols } else { hop };
            let fits = MixMatrix::strided_len(rows, cols, hop).is_ok_and(|n| buf.len() >= n);
            if !fits {
                return Err(ResultCode::InvalidParam);
            }
            let matrix = match &connection.matrix {
                Some(m) if m.rows == rows && m.cols == cols => m.clone(),
                _ => MixMatrix::identity(rows, cols),
            };
            for r in 0..rows {
                let row = &matrix.data[r * cols..(r + 1) * cols];
                buf[r * hop..r * hop + cols].copy_from_slice(row);
            }
        }
        Ok((rows, cols))
    }

    pub fn set_mix_matrix(
        &mut self,
        handle: NativeHandle,
        values: Option<&[f32]>,
        rows: usize,
        cols: usize,
        hop: usize,
    ) -> NativeResult<()> {
        let connection = self.connection(handle)?;
        let matrix = match values {
            None => None,
            Some(values) => {
                let expected = self.matrix_dims(connection)?;
                let hop = if hop == 0 { cols } else { hop };
                if (rows, cols) != expected || hop < cols {
                    return Err(ResultCode::InvalidParam);
                }
                let matrix = MixMatrix::from_strided(values, rows, cols, hop)
                    .map_err(|_| ResultCode::InvalidParam)?;
                Some(matrix)
            }
        };
        self.connection_mut(handle)?.matrix = matrix;
        Ok(())
    }

    // --- mixing ---

    fn establish_pending(&mut self) {
        let Some(rx) = self.pending_rx.as_mut() else {
            return;
        };
        while let Ok(handle) = rx.pop() {
            if let Some(SimObject::Connection(c)) = self.objects.get_mut(&handle) {
                c.established = true;
                trace!(connection = %handle, "connection established");
            }
        }
    }

    /// Run one mix block. Skipped while the DSP lock is held.
    pub fn mix(&mut self) {
        if self.locked {
            trace!("mix skipped, DSP lock held");
            return;
        }
        let Some(settings) = self.settings else {
            return;
        };
        self.establish_pending();
        self.tick += 1;

        let Ok(root) = self.node_index(self.master) else {
            return;
        };
        let ctx = ProcessContext { sample_rate: settings.sample_rate };
        let order = self.schedule(root);
        trace!(tick = self.tick, nodes = order.len(), "mix tick");
        for idx in order {
            self.execute(idx, &ctx);
        }
    }

    /// Nodes pulled by `root`, inputs before the nodes they feed. Only edges
    /// whose type forces execution are followed, and inactive nodes pull
    /// nothing.
    fn schedule(&self, root: NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(root, false)];

        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                order.push(idx);
                continue;
            }
            if !seen.insert(idx) {
                continue;
            }
            stack.push((idx, true));
            if !self.graph[idx].active {
                continue;
            }
            for edge in self.graph.edges_directed(idx, Incoming) {
                let weight = edge.weight();
                if weight.kind.forces_execution() && self.is_established(weight.connection) {
                    stack.push((edge.source(), false));
                }
            }
        }
        order
    }

    fn execute(&mut self, idx: NodeIndex, ctx: &ProcessContext) {
        let channels = self.graph[idx].format.channels.max(1) as usize;
        let mut input = vec![Buffer::SILENT; channels];
        let mut sidechain = vec![Buffer::SILENT; channels];

        for edge in self.ordered_edges(idx, Incoming) {
            let Some((source, _)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let weight = self.graph[edge];
            let Ok(connection) = self.connection(weight.connection) else {
                continue;
            };
            if !connection.established {
                continue;
            }
            let dest = if weight.kind.is_sidechain() { &mut sidechain } else { &mut input };
            let matrix = connection.matrix.as_ref();
            accumulate(dest, &self.graph[source].output, connection.mix, matrix);
        }

        let tick = self.tick;
        let node = &mut self.graph[idx];
        let mut output = vec![Buffer::SILENT; channels];
        if !node.active {
            node.output = output;
            return;
        }
        if node.bypass {
            output = input;
        } else {
            node.processor.process(ctx, &input, &mut output);
        }
        node.output = output;
        node.sidechain = sidechain;
        node.last_tick = tick;
        node.executions += 1;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Whether `dsp` sat out the last tick.
    pub fn idle(&self, dsp: NativeHandle) -> NativeResult<bool> {
        Ok(self.node(dsp)?.last_tick != self.tick)
    }

    pub fn release_count(&self, handle: NativeHandle) -> u32 {
        self.release_counts.get(&handle).copied().unwrap_or(0)
    }
}

/// Sum `src` into `dest` through `matrix` scaled by `mix`. A missing or
/// stale matrix maps channel `i` to channel `i`.
fn accumulate(dest: &mut [Buffer], src: &[Buffer], mix: f32, matrix: Option<&MixMatrix>) {
    let rows = dest.len();
    let cols = src.len();
    let matrix = matrix.filter(|m| m.rows == rows && m.cols == cols);

    for (r, out) in dest.iter_mut().enumerate() {
        for (c, inp) in src.iter().enumerate() {
            let gain = match matrix {
                Some(m) => m.data[r * cols + c],
                None if r == c => 1.0,
                None => 0.0,
            } * mix;
            if gain == 0.0 {
                continue;
            }
            for (o, i) in out.iter_mut().zip(inp.iter()) {
                *o += gain * i;
            }
        }
    }
}
