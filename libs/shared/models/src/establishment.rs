use serde::{Deserialize, Serialize};

use crate::cells;

/// Establishment codes are nine digits; the sheet often drops leading zeros.
pub const ESTABLISHMENT_ID_WIDTH: usize = 9;

pub fn normalize_establishment_id(raw: &str) -> String {
    format!("{:0>width$}", raw.trim(), width = ESTABLISHMENT_ID_WIDTH)
}

pub fn same_establishment(a: &str, b: &str) -> bool {
    normalize_establishment_id(a) == normalize_establishment_id(b)
}

/// A row of the `establecimientos` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Establishment {
    #[serde(with = "cells::text")]
    pub id: String,
    #[serde(rename = "nombre", with = "cells::text")]
    pub name: String,
}

impl Establishment {
    pub fn normalized_id(&self) -> String {
        normalize_establishment_id(&self.id)
    }
}

/// Name of the establishment with this code, comparing codes zero-padded.
pub fn establishment_name<'a>(establishments: &'a [Establishment], id: &str) -> Option<&'a str> {
    establishments
        .iter()
        .find(|e| same_establishment(&e.id, id))
        .map(|e| e.name.as_str())
}
