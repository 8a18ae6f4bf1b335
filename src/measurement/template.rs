use std::path::Path;

use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use super::{ElementKind, MeasKind, Side, side_str};
use crate::error::Result;
use crate::io::pandapower::Network;

/// Accepts `true`/`false` in any case as well as `1`/`0`.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean {other:?}"))),
    }
}

/// Empty, `none` and numeric sides (older templates store the bus id) mean no side.
fn lenient_side<'de, D>(deserializer: D) -> std::result::Result<Option<Side>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "" | "none" => Ok(None),
        "from" => Ok(Some(Side::From)),
        "to" => Ok(Some(Side::To)),
        "hv" => Ok(Some(Side::Hv)),
        "lv" => Ok(Some(Side::Lv)),
        num if num.parse::<f64>().is_ok() => Ok(None),
        other => Err(serde::de::Error::custom(format!("unknown side {other:?}"))),
    }
}

/// Writes a missing side as `none`.
fn side_or_none<S>(side: &Option<Side>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&side_str(*side))
}

/// One candidate measurement of the selection template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    #[serde(deserialize_with = "lenient_bool")]
    pub meas_picked: bool,
    pub meas_type: MeasKind,
    pub element_type: ElementKind,
    pub element: usize,
    #[serde(default, deserialize_with = "lenient_side", serialize_with = "side_or_none")]
    pub side: Option<Side>,
    pub side_idx: i64,
    pub other_side_idx: i64,
}

impl TemplateEntry {
    fn new(
        picked: bool,
        meas_type: MeasKind,
        element_type: ElementKind,
        element: usize,
        side: Option<Side>,
        buses: (i64, i64),
    ) -> Self {
        Self {
            meas_picked: picked,
            meas_type,
            element_type,
            element,
            side,
            side_idx: buses.0,
            other_side_idx: buses.1,
        }
    }
}

/// Every possible measurement of a network, with a default pick.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut)]
pub struct MeasTemplate(pub Vec<TemplateEntry>);

/// Enumerates all measurements of `net`.
///
/// Per bus `v`, `p`, `q` (unpicked); per line `p`/`q` at both ends (picked)
/// and currents (unpicked); per transformer likewise with `hv`/`lv`.
pub fn gen_meas_picker(net: &Network) -> MeasTemplate {
    use ElementKind::*;
    use MeasKind::*;

    let mut rows = Vec::with_capacity(3 * net.n_buses() + 6 * (net.lines().len() + net.trafos().len()));
    for bus in &net.bus {
        let b = bus.index;
        for kind in [V, P, Q] {
            rows.push(TemplateEntry::new(false, kind, Bus, b as usize, None, (b, b)));
        }
    }
    for (id, l) in net.lines().iter().enumerate() {
        let (f, t) = (l.from_bus, l.to_bus);
        for (picked, kind) in [(true, P), (true, Q), (false, I)] {
            rows.push(TemplateEntry::new(picked, kind, Line, id, Some(Side::From), (f, t)));
            rows.push(TemplateEntry::new(picked, kind, Line, id, Some(Side::To), (t, f)));
        }
    }
    for (id, tr) in net.trafos().iter().enumerate() {
        let (hv, lv) = (tr.hv_bus, tr.lv_bus);
        for (picked, kind) in [(true, P), (true, Q), (false, I)] {
            rows.push(TemplateEntry::new(picked, kind, Trafo, id, Some(Side::Hv), (hv, lv)));
            rows.push(TemplateEntry::new(picked, kind, Trafo, id, Some(Side::Lv), (lv, hv)));
        }
    }
    MeasTemplate(rows)
}

impl MeasTemplate {
    pub fn picked(&self) -> impl Iterator<Item = &TemplateEntry> + '_ {
        self.iter().filter(|e| e.meas_picked)
    }

    /// Writes the template for manual curation.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        for row in self.iter() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        info!(path = %path.display(), rows = self.len(), "wrote measurement template");
        Ok(())
    }

    /// Reads a (possibly hand-edited) template.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)?;
        let rows = rdr.deserialize().collect::<std::result::Result<Vec<TemplateEntry>, _>>()?;
        Ok(Self(rows))
    }
}
