// Capture buffer pool - lock-free sample transfer off the audio callback
//
// An object pool built from two SPSC ring buffers. The device callback
// pops an empty buffer from the pool queue, fills it with mono samples,
// and pushes it onto the data queue; the session worker pops filled
// buffers, processes them, and returns them to the pool. All allocation
// happens up front, so the audio callback never touches the heap.

use rtrb::{Consumer, Producer, RingBuffer};

/// Audio buffer type - pre-allocated vector of f32 samples
pub type SampleBuffer = Vec<f32>;

/// Device-side half: fills buffers inside the audio callback
pub struct CaptureWriter {
    pool_consumer: Consumer<SampleBuffer>,
    data_producer: Producer<SampleBuffer>,
}

impl CaptureWriter {
    /// Move one interleaved callback block into the data queue as mono.
    ///
    /// Takes the first channel of each interleaved frame. When the pool is
    /// exhausted or the data queue is full the block is dropped; dropping
    /// is preferable to blocking the audio callback.
    pub fn write(&mut self, samples: &[f32], channels: usize) {
        let Ok(mut buffer) = self.pool_consumer.pop() else {
            return;
        };

        buffer.clear();
        if channels <= 1 {
            buffer.extend_from_slice(samples);
        } else {
            for frame in samples.chunks(channels) {
                buffer.push(frame.first().copied().unwrap_or(0.0));
            }
        }

        let _ = self.data_producer.push(buffer);
    }
}

/// Worker-side half: consumes filled buffers and recycles them
pub struct CaptureReader {
    data_consumer: Consumer<SampleBuffer>,
    pool_producer: Producer<SampleBuffer>,
}

impl CaptureReader {
    /// Pop the next filled buffer, if one is ready.
    pub fn read(&mut self) -> Option<SampleBuffer> {
        self.data_consumer.pop().ok()
    }

    /// Return a processed buffer to the pool for reuse.
    pub fn recycle(&mut self, buffer: SampleBuffer) {
        if self.pool_producer.push(buffer).is_err() {
            tracing::warn!("[CapturePool] Pool queue full, dropping buffer");
        }
    }
}

/// Create a writer/reader pair backed by `buffer_count` pre-allocated
/// buffers of `buffer_size` samples each.
///
/// # Panics
/// Panics if `buffer_count` or `buffer_size` is 0.
pub fn capture_pair(buffer_count: usize, buffer_size: usize) -> (CaptureWriter, CaptureReader) {
    assert!(buffer_count > 0, "buffer_count must be greater than 0");
    assert!(buffer_size > 0, "buffer_size must be greater than 0");

    let (mut pool_producer, pool_consumer) = RingBuffer::new(buffer_count);
    let (data_producer, data_consumer) = RingBuffer::new(buffer_count);

    // The only heap allocation on the capture path happens here
    for _ in 0..buffer_count {
        pool_producer
            .push(vec![0.0_f32; buffer_size])
            .expect("pool queue sized to hold every pre-allocated buffer");
    }

    (
        CaptureWriter {
            pool_consumer,
            data_producer,
        },
        CaptureReader {
            data_consumer,
            pool_producer,
        },
    )
}
