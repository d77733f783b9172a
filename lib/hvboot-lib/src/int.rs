/// Smallest order `o` with `1 << o >= x`. `order_for(0) == 0`.
pub const fn order_for(x: usize) -> u8 {
    if x <= 1 {
        0
    } else {
        (usize::BITS - (x - 1).leading_zeros()) as u8
    }
}

/// Largest order `o` with `1 << o <= x`. `x` must not be zero.
pub const fn order_floor(x: usize) -> u8 {
    (usize::BITS - 1 - x.leading_zeros()) as u8
}

/// Order of the largest naturally aligned block starting at `addr`.
pub const fn alignment_order(addr: usize) -> u8 {
    if addr == 0 {
        (usize::BITS - 1) as u8
    } else {
        addr.trailing_zeros() as u8
    }
}

#[inline]
pub const fn align_up(x: usize, align: usize) -> usize {
    (x + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_for_rounds_up() {
        assert_eq!(order_for(0), 0);
        assert_eq!(order_for(1), 0);
        assert_eq!(order_for(2), 1);
        assert_eq!(order_for(3), 2);
        assert_eq!(order_for(4096), 12);
        assert_eq!(order_for(4097), 13);
    }

    #[test]
    fn order_floor_rounds_down() {
        assert_eq!(order_floor(1), 0);
        assert_eq!(order_floor(4095), 11);
        assert_eq!(order_floor(4096), 12);
    }

    #[test]
    fn alignment_order_of_addresses() {
        assert_eq!(alignment_order(0x1000), 12);
        assert_eq!(alignment_order(0x1010), 4);
        assert_eq!(alignment_order(0x3), 0);
    }
}
