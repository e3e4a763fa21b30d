use serde::Deserialize;

// Define pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

pub fn default_page() -> usize {
    1
}

pub fn default_page_size() -> usize {
    20
}

// Query parameters for the meeting list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub department: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl ListParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

// Query parameters for the analytics endpoint
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    pub department: Option<String>,
}

// Query parameters for the calendar endpoint
#[derive(Debug, Default, Deserialize)]
pub struct CalendarParams {
    pub view: Option<String>,
    pub date: Option<String>,
    pub department: Option<String>,
}
