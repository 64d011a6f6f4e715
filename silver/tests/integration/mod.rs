mod jsonl_pipeline_test;
mod merge_properties_test;
mod pipeline_test;
mod restart_test;
mod view_test;
