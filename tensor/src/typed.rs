use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;

use halyard_dtype::{HasDataType, ext};
use snafu::ensure;

use crate::Tensor;
use crate::error::*;

/// A [`Tensor`] whose elements are known to be `T`.
///
/// The tag and width are checked once when the wrapper is made, so element access afterwards is
/// safe. Cloning shares the same tensor.
#[derive(Debug)]
pub struct TypedTensor<T: HasDataType> {
    tensor: Rc<Tensor>,
    _element: PhantomData<T>,
}

impl<T: HasDataType> Clone for TypedTensor<T> {
    fn clone(&self) -> Self {
        Self { tensor: Rc::clone(&self.tensor), _element: PhantomData }
    }
}

impl<T: HasDataType> TypedTensor<T> {
    pub fn new(tensor: Rc<Tensor>) -> Result<Self> {
        tensor.check_element_type::<T>()?;
        Ok(Self { tensor, _element: PhantomData })
    }

    pub fn tensor(&self) -> &Rc<Tensor> {
        &self.tensor
    }

    pub fn into_inner(self) -> Rc<Tensor> {
        self.tensor
    }

    pub fn get(&self, index: usize) -> Result<T> {
        let len = self.tensor.size();
        ensure!(index < len, IndexOutOfBoundsSnafu { index, len });
        let offset = index * size_of::<T>();
        self.tensor.with_host_bytes(|bytes| T::from_ne_bytes(&bytes[offset..]))
    }

    /// Write one element to host-visible memory. Like `set_data`, device memory is untouched.
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        let len = self.tensor.size();
        ensure!(index < len, IndexOutOfBoundsSnafu { index, len });
        let offset = index * size_of::<T>();
        self.tensor.with_host_bytes(|bytes| {
            bytes[offset..offset + size_of::<T>()].copy_from_slice(ext::as_bytes(std::slice::from_ref(&value)))
        })
    }

    /// Replace every element. Fails with `SizeMismatch`, leaving the tensor untouched, unless
    /// `data` has exactly `size()` elements.
    pub fn set_data(&self, data: &[T]) -> Result<()> {
        let expected = self.tensor.size();
        ensure!(data.len() == expected, SizeMismatchSnafu { expected, actual: data.len() });
        self.tensor.set_raw_data(ext::as_bytes(data))
    }

    pub fn vector(&self) -> Result<Vec<T>> {
        self.tensor.vector()
    }
}

impl<T: HasDataType> Deref for TypedTensor<T> {
    type Target = Tensor;

    fn deref(&self) -> &Tensor {
        &self.tensor
    }
}
