//! `ReadOrdered` says that a type can be read from with integers of a
//! certain size in either byte ordering.
//!
//! The trait is implemented for any type that implements `Read` for all of
//! the common unsigned integer types, so it **does not need to be implemented by the user**.
//!
//! ROM headers are always big-endian, so most callers go through [`read_be`].

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use num_traits::PrimInt;
use std::io::Cursor;

pub trait ReadOrdered<T: PrimInt>: ReadBytesExt {
    fn read_ordered<Order: ByteOrder>(&mut self) -> std::io::Result<T>;
}

macro_rules! make_impl {
    { $len:literal, $inttype:ty, $funcname:ident } => {
        impl<T: ReadBytesExt> ReadOrdered<$inttype> for T {
            fn read_ordered<Order: ByteOrder>(&mut self) -> std::io::Result<$inttype> {
                self.$funcname::<Order>()
            }
        }
    };
}

// Special cased in byteorder because it doesn't need an ordering
impl<T: ReadBytesExt> ReadOrdered<u8> for T {
    fn read_ordered<Order: ByteOrder>(&mut self) -> std::io::Result<u8> {
        self.read_u8()
    }
}

make_impl! { 2, u16, read_u16 }
make_impl! { 4, u32, read_u32 }

/// Reads a big-endian integer at `offset`, or `None` if it would run past the end of `src`.
pub fn read_be<T: PrimInt>(src: &[u8], offset: usize) -> Option<T>
where
    for<'a> Cursor<&'a [u8]>: ReadOrdered<T>,
{
    let mut cursor = Cursor::new(src.get(offset..)?);
    <Cursor<&[u8]> as ReadOrdered<T>>::read_ordered::<BigEndian>(&mut cursor).ok()
}
