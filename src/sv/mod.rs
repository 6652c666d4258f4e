pub mod affiliate;
pub mod analytics;
pub mod audit;
pub mod cascade;
pub mod dashboard;
pub mod referral;
#[cfg(test)]
pub mod test_utils;
pub mod tree;

pub use affiliate::Affiliate;
pub use audit::Audit;
pub use dashboard::Dashboard;
pub use referral::Referral;
