pub mod identify_people_use_case;
pub mod pipeline_context;
pub mod stats_collector;
