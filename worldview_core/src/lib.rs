//! WorldView Core - shared behavioral core of the live world-map renderers
//!
//! Two renderer backends (vector and GPU compositor) must stay visually and
//! behaviorally identical. Everything that decides *what* is drawn lives here,
//! behind a narrow [`Projector`] seam:
//! 1. **Clustering**: seed-anchored screen-space marker clustering with a zoom-bucket cache
//! 2. **Scheduling**: throttled overlay sync, debounced rebuilds, coalesced prop updates
//! 3. **Visibility**: zoom thresholds with a sticky user override
//! 4. **Escalation**: keyword/recency activity scoring for points of interest
//!
//! The core is sans-IO. Time comes from a [`worldview_env::MapContext`], timers
//! live in [`TimerQueue`]s, and [`FrameDriver`] plays the role of the event loop.

pub mod catalog;
pub mod clustering;
pub mod config;
pub mod error;
pub mod escalation;
pub mod feeds;
pub mod highlight;
pub mod layers;
pub mod map;
pub mod popup;
pub mod projection;
pub mod runtime;
pub mod scheduler;
pub mod timers;
pub mod view;
pub mod visibility;

// Re-export key types for convenience
pub use catalog::ReferenceCatalog;
pub use clustering::{cluster, Cluster, ClusterCache, GroupKeyStrategy, RadiusPolicy, ZoomBucketTracker};
pub use config::{ClusterMode, MapConfig};
pub use error::{ConfigError, CoreError, ViewStateError};
pub use escalation::{AlertLookup, EscalationLevel, EscalationPolicy, EscalationScorer, EscalationState};
pub use feeds::{Marker, MarkerPayload};
pub use highlight::{AssetType, HighlightTracker};
pub use layers::LayerKey;
pub use map::{FrameSnapshot, LayerDataStatus, MapCore, OverlayFrame, RenderBackend};
pub use popup::{LayerId, PopupEvent, PopupRequest, PopupResolver, PopupTarget, RelatedNewsQuery, TriggerMode};
pub use projection::{Equirectangular, GeoPoint, Projector, ScreenPoint, WebMercator};
pub use runtime::FrameDriver;
pub use scheduler::{BackendKind, BackingStore, FramePlan, RenderScheduler, SchedulerConfig, SchedulerStats};
pub use timers::TimerQueue;
pub use view::{MapView, TimeRange, ViewState};
pub use visibility::{resolve, LayerRegistry, LayerVisibility, ThresholdTable, ZoomThreshold};
