pub mod aggregator;

pub use aggregator::{
    AnalyticsAggregator, DeviceCount, LinkAnalytics, RecentClick, ReferrerCount,
};
