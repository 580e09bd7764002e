use crate::{
    data_structures::instance::{AttributeColumns, InstanceAttribute},
    instancing::group::RowWrite,
};

/// The six GPU attribute buffers mirroring one [`AttributeColumns`].
#[derive(Debug)]
pub struct InstanceBuffers {
    label: String,
    buffers: [wgpu::Buffer; 6],
    capacity: usize,
}

impl InstanceBuffers {
    pub fn new(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            label: label.to_string(),
            buffers: Self::allocate(device, label, capacity),
            capacity,
        }
    }

    fn allocate(device: &wgpu::Device, label: &str, capacity: usize) -> [wgpu::Buffer; 6] {
        InstanceAttribute::ALL.map(|attribute| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} {attribute:?} Instance Buffer")),
                size: attribute.stride() * capacity as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer(&self, attribute: InstanceAttribute) -> &wgpu::Buffer {
        &self.buffers[attribute.index()]
    }

    /// Uploads every row of `columns`, growing the buffers if needed.
    pub fn upload_all(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, columns: &AttributeColumns) {
        if columns.len() > self.capacity {
            self.capacity = columns.len().next_power_of_two();
            self.buffers = Self::allocate(device, &self.label, self.capacity);
            log::debug!("{} instance buffers grown to {} rows", self.label, self.capacity);
        }
        if columns.is_empty() {
            return;
        }
        for attribute in InstanceAttribute::ALL {
            queue.write_buffer(
                self.buffer(attribute),
                0,
                columns.bytes(attribute, 0..columns.len()),
            );
        }
    }

    /// Replays row writes, touching only the buffers each write's mask selects.
    pub fn write_rows<'a>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        columns: &AttributeColumns,
        writes: impl IntoIterator<Item = &'a RowWrite>,
    ) {
        if columns.len() > self.capacity {
            self.upload_all(device, queue, columns);
            return;
        }
        for write in writes {
            if write.row >= columns.len() {
                continue;
            }
            for attribute in InstanceAttribute::for_mask(write.mask) {
                queue.write_buffer(
                    self.buffer(attribute),
                    attribute.stride() * write.row as wgpu::BufferAddress,
                    columns.bytes(attribute, write.row..write.row + 1),
                );
            }
        }
    }

    /// Binds the six streams at vertex slots 1..=6.
    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        for attribute in InstanceAttribute::ALL {
            render_pass.set_vertex_buffer(attribute.slot(), self.buffer(attribute).slice(..));
        }
    }
}
