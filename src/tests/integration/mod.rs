mod api_test;
mod workflow_test;
