//! Data descriptors consumed by the shape binder.

use kbind_dtype::{HasDType, ScalarDType};

/// Something with a concrete runtime shape.
///
/// The full shape is reported, trailing axis included; the binder trims it to
/// the counted dimensions of the matching shape template.
pub trait DataDescriptor {
    fn shape(&self) -> &[usize];

    /// Element type, when the descriptor knows it.
    fn dtype(&self) -> Option<ScalarDType> {
        None
    }
}

impl DataDescriptor for [usize] {
    fn shape(&self) -> &[usize] {
        self
    }
}

impl<const N: usize> DataDescriptor for [usize; N] {
    fn shape(&self) -> &[usize] {
        self
    }
}

impl DataDescriptor for Vec<usize> {
    fn shape(&self) -> &[usize] {
        self
    }
}

impl<D: DataDescriptor + ?Sized> DataDescriptor for &D {
    fn shape(&self) -> &[usize] {
        (**self).shape()
    }

    fn dtype(&self) -> Option<ScalarDType> {
        (**self).dtype()
    }
}

/// A C-contiguous host buffer with a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBuffer<T> {
    data: Vec<T>,
    shape: Vec<usize>,
}

impl<T: HasDType> DataBuffer<T> {
    /// Wrap `data` with `shape`; returns `None` when the element count disagrees.
    pub fn new(data: Vec<T>, shape: &[usize]) -> Option<Self> {
        (shape.iter().product::<usize>() == data.len()).then(|| Self { data, shape: shape.to_vec() })
    }

    /// A one-dimensional buffer.
    pub fn from_vec(data: Vec<T>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    pub fn filled(value: T, shape: &[usize]) -> Self {
        Self { data: vec![value; shape.iter().product()], shape: shape.to_vec() }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr().cast()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr().cast()
    }
}

impl<T: HasDType> DataDescriptor for DataBuffer<T> {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn dtype(&self) -> Option<ScalarDType> {
        Some(T::DTYPE)
    }
}
