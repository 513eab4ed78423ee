use std::marker::PhantomData;

use glam::{Vec2, Vec4};
use log::info;
use ndarray::Array2;
use smallvec::SmallVec;

use crate::{
    backend::{Backend, FieldId, TextureId},
    error::FluidError,
};

/// Storage precision of a channel set. Every channel set holds four channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    #[default]
    Rgba16Float,
    Rgba32Float,
}

/// The named channel sets of a field and their storage format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelLayout {
    names: SmallVec<[&'static str; 4]>,
    format: TexelFormat,
}

impl ChannelLayout {
    pub fn new<I: IntoIterator<Item = &'static str>>(names: I, format: TexelFormat) -> Self {
        Self {
            names: names.into_iter().collect(),
            format,
        }
    }

    /// A layout with a single channel set.
    pub fn single(name: &'static str, format: TexelFormat) -> Self {
        Self::new([name], format)
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }
}

/// One channel set of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub name: &'static str,
    pub texture: TextureId,
}

/// A 2D grid of texels owned by a backend.
///
/// A `Field` is a handle: it is created by [`Backend::allocate_field`] and must be handed back to
/// [`Backend::release_field`]. It is deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct Field {
    id: FieldId,
    width: u32,
    height: u32,
    attachments: SmallVec<[Attachment; 4]>,
}

impl Field {
    pub fn new<I: IntoIterator<Item = Attachment>>(id: FieldId, width: u32, height: u32, attachments: I) -> Self {
        let attachments: SmallVec<[Attachment; 4]> = attachments.into_iter().collect();
        debug_assert!(!attachments.is_empty(), "a field needs at least one channel set");

        Self {
            id,
            width,
            height,
            attachments,
        }
    }

    #[inline]
    pub fn id(&self) -> FieldId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Distance between neighboring cell centers in normalized coordinates.
    #[inline]
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The first channel set, bound for sampling.
    pub fn sampled(&self) -> Sampled<'_> {
        Sampled::new(self.id, self.attachments[0].texture)
    }

    pub fn target(&self) -> Target<'_> {
        Target::Field(self)
    }
}

/// A channel set bound for reading. Borrows the field it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampled<'a> {
    field: FieldId,
    texture: TextureId,
    _field: PhantomData<&'a Field>,
}

impl Sampled<'_> {
    fn new(field: FieldId, texture: TextureId) -> Self {
        Self {
            field,
            texture,
            _field: PhantomData,
        }
    }

    #[inline]
    pub fn field(&self) -> FieldId {
        self.field
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }
}

/// Where a pass writes.
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    Field(&'a Field),
    /// The presentation surface.
    Surface,
}

/// A field with two buffers that trade roles on [`swap`](DoubleField::swap).
///
/// The read side can only be sampled and the write side can only be rendered into, so a pass
/// cannot bind the buffer it writes as one of its inputs. Both handles borrow the field, which
/// keeps them from outliving a swap.
#[derive(Debug)]
pub struct DoubleField {
    read: Field,
    write: Field,
    layout: ChannelLayout,
}

impl DoubleField {
    pub fn create<B: Backend>(
        backend: &mut B,
        width: u32,
        height: u32,
        layout: ChannelLayout,
    ) -> Result<Self, FluidError> {
        let read = backend.allocate_field(width, height, &layout)?;
        let write = match backend.allocate_field(width, height, &layout) {
            Ok(write) => write,
            Err(err) => {
                backend.release_field(read);
                return Err(err);
            }
        };

        Ok(Self { read, write, layout })
    }

    #[inline]
    pub fn read(&self) -> ReadHandle<'_> {
        ReadHandle(&self.read)
    }

    #[inline]
    pub fn write(&self) -> WriteHandle<'_> {
        WriteHandle(&self.write)
    }

    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    /// Reallocates both buffers at the new size. The contents are not preserved.
    ///
    /// On failure the field keeps its previous storage.
    pub fn resize<B: Backend>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<(), FluidError> {
        let resized = Self::create(backend, width, height, self.layout.clone())?;
        let old = std::mem::replace(self, resized);
        info!("resized field {}x{} -> {width}x{height}", old.width(), old.height());
        old.release(backend);

        Ok(())
    }

    pub fn release<B: Backend>(self, backend: &mut B) {
        backend.release_field(self.read);
        backend.release_field(self.write);
    }

    /// Uploads `data` as the new current state.
    pub fn load<B: Backend>(&mut self, backend: &mut B, data: &Array2<Vec4>) -> Result<(), FluidError> {
        backend.upload(&self.write, data)?;
        self.swap();

        Ok(())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.read.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.read.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.read.size()
    }

    #[inline]
    pub fn texel_size(&self) -> Vec2 {
        self.read.texel_size()
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }
}

/// The current state of a [`DoubleField`].
#[derive(Clone, Copy, Debug)]
pub struct ReadHandle<'a>(&'a Field);

impl<'a> ReadHandle<'a> {
    pub fn id(&self) -> FieldId {
        self.0.id
    }

    pub fn sampled(&self) -> Sampled<'a> {
        self.0.sampled()
    }

    pub fn size(&self) -> (u32, u32) {
        self.0.size()
    }
}

/// The scratch buffer of a [`DoubleField`].
#[derive(Clone, Copy, Debug)]
pub struct WriteHandle<'a>(&'a Field);

impl<'a> WriteHandle<'a> {
    pub fn id(&self) -> FieldId {
        self.0.id
    }

    pub fn target(&self) -> Target<'a> {
        Target::Field(self.0)
    }

    pub fn size(&self) -> (u32, u32) {
        self.0.size()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::backend::cpu::CpuBackend;

    fn layout() -> ChannelLayout {
        ChannelLayout::single("main", TexelFormat::Rgba16Float)
    }

    #[test]
    fn swap_twice_restores_roles() {
        let mut backend = CpuBackend::new();
        let mut field = DoubleField::create(&mut backend, 8, 4, layout()).unwrap();

        let read = field.read().id();
        let write = field.write().id();
        assert_ne!(read, write);

        field.swap();
        assert_eq!(field.read().id(), write);
        assert_eq!(field.write().id(), read);

        field.swap();
        assert_eq!(field.read().id(), read);
        assert_eq!(field.write().id(), write);
    }

    #[test]
    fn load_becomes_read_state() {
        let mut backend = CpuBackend::new();
        let mut field = DoubleField::create(&mut backend, 3, 2, layout()).unwrap();

        let data = Array2::from_shape_fn((3, 2), |(x, y)| Vec4::new(x as f32, y as f32, 0.0, 1.0));
        field.load(&mut backend, &data).unwrap();

        let back = backend.read_back(field.read().sampled()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn resize_replaces_both_buffers() {
        let mut backend = CpuBackend::new();
        let mut field = DoubleField::create(&mut backend, 16, 16, layout()).unwrap();
        let old = (field.read().id(), field.write().id());

        field.resize(&mut backend, 32, 8).unwrap();

        assert_eq!(field.size(), (32, 8));
        assert_eq!(field.read().size(), field.write().size());
        assert_ne!(field.read().id(), old.0);
        assert_ne!(field.write().id(), old.1);
        assert_eq!(field.texel_size(), Vec2::new(1.0 / 32.0, 1.0 / 8.0));
    }

    #[test]
    fn failed_resize_keeps_storage() {
        let mut backend = CpuBackend::new();
        let mut field = DoubleField::create(&mut backend, 16, 16, layout()).unwrap();
        let read = field.read().id();

        assert!(field.resize(&mut backend, 0, 16).is_err());
        assert_eq!(field.size(), (16, 16));
        assert_eq!(field.read().id(), read);
        assert!(backend.read_back(field.read().sampled()).is_ok());
    }
}
