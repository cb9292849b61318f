pub mod weights_cache;

pub use weights_cache::{
    Clock, FileWeightsProvider, LoadedWeights, SystemClock, WeightsCache, WeightsProvider, WeightsSnapshot,
};
