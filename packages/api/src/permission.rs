use bitflags::bitflags;

bitflags! {
    /// Global permission bits stored on the user row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlobalPermission: i64 {
        const ADMIN = 1 << 0;
        /// Create, edit, and deactivate coupon records.
        const MANAGE_COUPONS = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bits_roundtrip() {
        let bits = (GlobalPermission::ADMIN | GlobalPermission::MANAGE_COUPONS).bits();
        let restored = GlobalPermission::from_bits(bits).unwrap();
        assert!(restored.contains(GlobalPermission::ADMIN));
        assert!(restored.contains(GlobalPermission::MANAGE_COUPONS));
    }

    #[test]
    fn unknown_bits_are_rejected() {
        assert!(GlobalPermission::from_bits(1 << 62).is_none());
    }
}
