use std::sync::Arc;

/// One stream of a compiled program. Opaque to the messaging layer.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub stream_id: u32,
    /// Packets per second at rate factor 1.0.
    pub pps: f64,
    pub packet_len: u16,
}

/// A compiled, ready-to-transmit stream set.
///
/// Built by the stream compiler (out of scope here), handed to a DP core by
/// value inside a Start command. Broadcast clones of the command share the
/// program read-only; dropping the last owner releases it.
#[derive(Debug)]
pub struct StreamProgram {
    streams: Vec<StreamSpec>,
}

impl StreamProgram {
    pub fn new(streams: Vec<StreamSpec>) -> Self {
        Self { streams }
    }

    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    /// Aggregate rate of the program at factor 1.0.
    pub fn total_pps(&self) -> f64 {
        self.streams.iter().map(|s| s.pps).sum()
    }
}

/// Handle to a compiled stream program as carried inside messages.
pub type CompiledStreams = Arc<StreamProgram>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pps_sums_streams() {
        let program = StreamProgram::new(vec![
            StreamSpec {
                stream_id: 1,
                pps: 100.0,
                packet_len: 64,
            },
            StreamSpec {
                stream_id: 2,
                pps: 50.0,
                packet_len: 1518,
            },
        ]);
        assert_eq!(program.total_pps(), 150.0);
        assert_eq!(program.streams().len(), 2);
    }
}
