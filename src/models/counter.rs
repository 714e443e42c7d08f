//! Named view counters

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

static COUNTER_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._:-]{1,100}$").unwrap());

static COUNTER_NAME_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._:-]{1,100}(,[A-Za-z0-9._:-]{1,100}){0,49}$")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub count: i64,
}

/// Path segment of `PUT /counters/{name}`
#[derive(Debug, Deserialize, Validate)]
pub struct CounterName {
    #[validate(regex(path = *COUNTER_NAME, message = "Invalid counter name."))]
    pub name: String,
}

/// `GET /counters?names=a,b`
#[derive(Debug, Deserialize, Validate)]
pub struct CounterQuery {
    #[validate(regex(path = *COUNTER_NAME_LIST, message = "Invalid counter names."))]
    pub names: String,
}

impl CounterQuery {
    pub fn split_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.split(',').map(str::to_string).collect();
        names.sort();
        names.dedup();
        names
    }
}
