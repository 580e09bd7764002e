//! Optional GPU pass timings.
//!
//! Each render pass gets a begin/end timestamp pair. At the end of a frame
//! the queries are resolved and copied to a readback buffer which is mapped
//! asynchronously. The next frames poll the device without waiting; once the
//! mapping has completed the timings are read and a new readback may start.
//! Frames recorded while a readback is still in flight are not measured.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

/// Two timestamps per pass.
const MAX_PASSES: u32 = 64;

const IDLE: u8 = 0;
const MAPPING: u8 = 1;
const MAPPED: u8 = 2;
const FAILED: u8 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PassTiming {
    pub label: String,
    pub milliseconds: f64,
}

#[derive(Debug)]
struct Queries {
    set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    period: f32,
}

#[derive(Debug, Default)]
pub struct GpuProfiler {
    queries: Option<Queries>,
    /// Passes recorded in the frame being built.
    labels: Vec<String>,
    /// Passes whose timestamps sit in the readback buffer.
    in_flight: Vec<String>,
    state: Arc<AtomicU8>,
    timings: Vec<PassTiming>,
    recording: bool,
}

impl GpuProfiler {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            log::info!("timestamp queries unsupported, pass timings disabled");
            return Self::default();
        }
        let size = (MAX_PASSES * 2) as wgpu::BufferAddress * wgpu::QUERY_SIZE as wgpu::BufferAddress;
        let queries = Queries {
            set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("pass timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: MAX_PASSES * 2,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp resolve"),
                size,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            period: queue.get_timestamp_period(),
        };
        Self {
            queries: Some(queries),
            ..Self::default()
        }
    }

    pub fn supported(&self) -> bool {
        self.queries.is_some()
    }

    /// Starts measuring a frame if profiling is on and no readback is pending.
    pub fn begin_frame(&mut self, device: &wgpu::Device, enabled: bool) {
        self.collect(device);
        self.labels.clear();
        self.recording = enabled && self.supported() && self.state.load(Ordering::Acquire) == IDLE;
    }

    /// Timestamp writes for the next pass, if this frame is measured.
    pub fn timestamp_writes(&mut self, label: &str) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        if !self.recording || self.labels.len() as u32 >= MAX_PASSES {
            return None;
        }
        let queries = self.queries.as_ref()?;
        let index = self.labels.len() as u32 * 2;
        self.labels.push(label.to_string());
        Some(wgpu::RenderPassTimestampWrites {
            query_set: &queries.set,
            beginning_of_pass_write_index: Some(index),
            end_of_pass_write_index: Some(index + 1),
        })
    }

    /// Resolves the frame's queries into the readback buffer.
    pub fn end_frame(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let Some(queries) = &self.queries else {
            return;
        };
        if !self.recording || self.labels.is_empty() {
            self.recording = false;
            return;
        }
        let count = self.labels.len() as u32 * 2;
        encoder.resolve_query_set(&queries.set, 0..count, &queries.resolve, 0);
        encoder.copy_buffer_to_buffer(
            &queries.resolve,
            0,
            &queries.readback,
            0,
            count as wgpu::BufferAddress * wgpu::QUERY_SIZE as wgpu::BufferAddress,
        );
    }

    /// Starts mapping the readback buffer. Call after the frame was submitted.
    pub fn after_submit(&mut self) {
        let Some(queries) = &self.queries else {
            return;
        };
        if !std::mem::take(&mut self.recording) {
            return;
        }
        self.in_flight = std::mem::take(&mut self.labels);
        self.state.store(MAPPING, Ordering::Release);
        let state = self.state.clone();
        queries
            .readback
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let next = if result.is_ok() { MAPPED } else { FAILED };
                state.store(next, Ordering::Release);
            });
    }

    /// Reads finished timings without blocking.
    fn collect(&mut self, device: &wgpu::Device) {
        let Some(queries) = &self.queries else {
            return;
        };
        match self.state.load(Ordering::Acquire) {
            IDLE => return,
            MAPPING => {
                if let Err(e) = device.poll(wgpu::PollType::Poll) {
                    log::debug!("profiler poll failed: {e}");
                }
            }
            _ => {}
        }
        match self.state.load(Ordering::Acquire) {
            MAPPED => {
                let ticks: Vec<u64> = {
                    let data = queries.readback.slice(..).get_mapped_range();
                    bytemuck::cast_slice::<u8, u64>(&data)
                        .iter()
                        .take(self.in_flight.len() * 2)
                        .copied()
                        .collect()
                };
                queries.readback.unmap();
                self.timings = pass_timings(&self.in_flight, &ticks, queries.period);
                self.state.store(IDLE, Ordering::Release);
            }
            FAILED => {
                log::warn!("timestamp readback failed, dropping one frame of timings");
                self.state.store(IDLE, Ordering::Release);
            }
            _ => log::trace!("timestamps not ready, skipping"),
        }
    }

    /// The most recently completed measurement.
    pub fn timings(&self) -> &[PassTiming] {
        &self.timings
    }
}

/// Pairs begin/end ticks with their pass labels.
pub fn pass_timings(labels: &[String], ticks: &[u64], period_ns: f32) -> Vec<PassTiming> {
    labels
        .iter()
        .zip(ticks.chunks_exact(2))
        .map(|(label, pair)| PassTiming {
            label: label.clone(),
            milliseconds: pair[1].saturating_sub(pair[0]) as f64 * period_ns as f64 / 1_000_000.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn ticks_become_milliseconds() {
        let labels = vec!["forward".to_string(), "bloom".to_string()];
        let ticks = [1_000, 3_000_000, 3_000_000, 3_500_000];
        let timings = pass_timings(&labels, &ticks, 1.0);
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].label, "forward");
        assert_relative_eq!(timings[0].milliseconds, 2.999, epsilon = 1e-9);
        assert_relative_eq!(timings[1].milliseconds, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn reversed_ticks_do_not_underflow() {
        let timings = pass_timings(&["x".to_string()], &[10, 5], 1.0);
        assert_eq!(timings[0].milliseconds, 0.0);
    }

    #[test]
    fn unsupported_profiler_records_nothing() {
        let mut profiler = GpuProfiler::default();
        assert!(!profiler.supported());
        assert!(profiler.timestamp_writes("forward").is_none());
        assert!(profiler.timings().is_empty());
    }
}
