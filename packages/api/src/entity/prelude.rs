pub use super::coupon::Entity as Coupon;
pub use super::coupon_usage::Entity as CouponUsage;
pub use super::order::Entity as Order;
pub use super::stripe_event::Entity as StripeEvent;
pub use super::subscription::Entity as Subscription;
pub use super::user::Entity as User;
