pub mod prelude;

pub mod coupon;
pub mod coupon_usage;
pub mod order;
pub mod sea_orm_active_enums;
pub mod stripe_event;
pub mod subscription;
pub mod user;
