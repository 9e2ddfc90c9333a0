//! GPU buffer creation and readback.

use super::GpuError;
use wgpu::{Buffer, BufferUsages, Device, Queue};

/// Smallest buffer we create; zero-sized storage bindings are invalid.
pub const MIN_BUFFER_SIZE: u64 = 16;

/// Upload data to a GPU buffer.
pub fn create_buffer_init<T: bytemuck::Pod>(
    device: &Device,
    label: &str,
    data: &[T],
    usage: BufferUsages,
) -> Buffer {
    use wgpu::util::DeviceExt;

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage,
    })
}

/// Upload raw little-endian words, zero-padded to a 4-byte multiple of at
/// least [`MIN_BUFFER_SIZE`]. Empty tables (flat scenes, SH degree 0) still
/// get a bindable buffer.
pub fn create_word_buffer(device: &Device, label: &str, bytes: &[u8], usage: BufferUsages) -> Buffer {
    let size = (bytes.len() as u64).next_multiple_of(4).max(MIN_BUFFER_SIZE) as usize;
    let mut padded = Vec::with_capacity(size);
    padded.extend_from_slice(bytes);
    padded.resize(size, 0);
    create_buffer_init(device, label, &padded, usage)
}

/// Create an uninitialized buffer.
pub fn create_buffer(device: &Device, label: &str, size: u64, usage: BufferUsages) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(MIN_BUFFER_SIZE),
        usage,
        mapped_at_creation: false,
    })
}

/// Readback target for `copy_*_to_buffer`.
pub fn create_staging_buffer(device: &Device, label: &str, size: u64) -> Buffer {
    create_buffer(device, label, size, BufferUsages::MAP_READ | BufferUsages::COPY_DST)
}

/// Map a staging buffer whose copy has already been submitted and return its
/// bytes.
pub async fn map_staging(device: &Device, staging: &Buffer) -> Result<Vec<u8>, GpuError> {
    let (tx, rx) = futures::channel::oneshot::channel();
    staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    device.poll(wgpu::Maintain::Wait);

    rx.await.map_err(|_| GpuError::ChannelClosed)??;

    let data = staging.slice(..).get_mapped_range();
    let bytes = data.to_vec();
    drop(data);
    staging.unmap();
    Ok(bytes)
}

/// Read `count` records back from a `COPY_SRC` buffer.
pub async fn read_buffer<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    count: usize,
) -> Result<Vec<T>, GpuError> {
    let size = (count * std::mem::size_of::<T>()) as u64;
    let staging = create_staging_buffer(device, "Staging Buffer", size);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let bytes = map_staging(device, &staging).await?;
    Ok(records_from_bytes(&bytes, count))
}

/// Copy the first `count` records out of a mapped byte range. Mapped ranges
/// carry no alignment guarantee for `T`, so this copies instead of casting.
pub fn records_from_bytes<T: bytemuck::Pod>(bytes: &[u8], count: usize) -> Vec<T> {
    let mut records = vec![T::zeroed(); count];
    let size = std::mem::size_of_val(records.as_slice());
    bytemuck::cast_slice_mut::<T, u8>(&mut records).copy_from_slice(&bytes[..size]);
    records
}

/// Blocking wrapper for [`read_buffer`].
pub fn read_buffer_blocking<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    count: usize,
) -> Result<Vec<T>, GpuError> {
    pollster::block_on(read_buffer(device, queue, buffer, count))
}

/// Bytes per row of a texture copy, padded to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    (width * bytes_per_pixel).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}
