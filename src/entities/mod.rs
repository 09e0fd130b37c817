//! SeaORM entity definitions for the RFQ domain.
//!
//! Ownership chain: a user owns suppliers and orders; orders own quotes and
//! the order/supplier invitation rows. Deletes cascade down that chain, with
//! one exception: a supplier with quotes on record refuses deletion at the
//! service layer.

pub mod order;
pub mod order_supplier;
pub mod quote;
pub mod supplier;
pub mod user;
