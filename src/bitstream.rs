use crate::io_traits::ReadOrdered;
use byteorder::ByteOrder;
use num_traits::PrimInt;
use std::marker::PhantomData;

/// Control-bit reader over a `T`-sized description field.
///
/// Bits are handed out MSB first. A new field is only fetched from the
/// source when a bit is actually requested and the current one is used up,
/// so the reader never consumes a field it does not need.
pub struct IBitStream<T: PrimInt, Order: ByteOrder> {
    read_bits: u32,
    byte_buffer: T,
    _order: PhantomData<Order>,
}

impl<T: PrimInt, Order: ByteOrder> IBitStream<T, Order> {
    fn bit_width() -> u32 {
        T::zero().count_zeros()
    }

    fn check_buffer<R: ReadOrdered<T> + ?Sized>(&mut self, src: &mut R) -> std::io::Result<()> {
        if self.read_bits != 0 {
            return Ok(());
        }

        self.byte_buffer = src.read_ordered::<Order>()?;
        self.read_bits = Self::bit_width();
        Ok(())
    }

    /// Creates an empty stream; the first call to `get` loads a field.
    pub fn new() -> Self {
        Self {
            read_bits: 0,
            byte_buffer: T::zero(),
            _order: PhantomData,
        }
    }

    /// Gets a single bit from the stream. Remembers previously read bits,
    /// and gets a field from the actual stream once all bits in the current
    /// one have been read.
    pub fn get<R: ReadOrdered<T> + ?Sized>(&mut self, src: &mut R) -> std::io::Result<bool> {
        self.check_buffer(src)?;
        self.read_bits -= 1;
        let bit = (self.byte_buffer >> self.read_bits as usize) & T::one();
        self.byte_buffer = self.byte_buffer ^ (bit << self.read_bits as usize);
        Ok(bit != T::zero())
    }
}

impl<T: PrimInt, Order: ByteOrder> Default for IBitStream<T, Order> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use byteorder::BigEndian;
    use std::io::Cursor;

    #[test]
    fn msb_first() {
        let mut src = Cursor::new(&[0b1010_0001_u8][..]);
        let mut bits = IBitStream::<u8, BigEndian>::new();

        let read = (0..8)
            .map(|_| bits.get(&mut src).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(
            read,
            [true, false, true, false, false, false, false, true]
        );
        assert_eq!(src.position(), 1);
    }

    #[test]
    fn lazy_refill() {
        let mut src = Cursor::new(&[0xFF_u8, 0x00][..]);
        let mut bits = IBitStream::<u8, BigEndian>::new();

        assert_eq!(src.position(), 0);
        assert!(bits.get(&mut src).unwrap());
        assert_eq!(src.position(), 1);

        for _ in 0..7 {
            assert!(bits.get(&mut src).unwrap());
        }
        // The second field is untouched until another bit is asked for
        assert_eq!(src.position(), 1);

        assert!(!bits.get(&mut src).unwrap());
        assert_eq!(src.position(), 2);
    }

    #[test]
    fn exhausted_source() {
        let mut src = Cursor::new(&[0x80_u8][..]);
        let mut bits = IBitStream::<u8, BigEndian>::new();

        for _ in 0..8 {
            bits.get(&mut src).unwrap();
        }

        assert!(bits.get(&mut src).is_err());
    }

    #[test]
    fn wide_fields() {
        let mut src = Cursor::new(&[0x80_u8, 0x01][..]);
        let mut bits = IBitStream::<u16, BigEndian>::new();

        assert!(bits.get(&mut src).unwrap());
        for _ in 0..14 {
            assert!(!bits.get(&mut src).unwrap());
        }
        assert!(bits.get(&mut src).unwrap());
    }
}
