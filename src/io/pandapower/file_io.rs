use csv::ReaderBuilder;
use serde::Deserializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, fs::File};
use std::{io::Read, option::Option};

use serde_json::{Map, Value};

use crate::error::{NetworkError, Result};

/// This module is used to parse pandapower network parameters

/// Deserializes a number from JSON format.
fn from_number<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: serde_json::Value = Deserialize::deserialize(deserializer)?;
    if let serde_json::Value::Number(n) = val {
        return Ok(n.as_f64().map(|x| x as i64));
    }
    Ok(None)
}

/// Deserializes a string from JSON format.
fn from_str<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: serde_json::Value = Deserialize::deserialize(deserializer)?;
    if let serde_json::Value::Number(n) = val {
        return Ok(Some(n.to_string()));
    }
    if let serde_json::Value::String(s) = val {
        return Ok(Some(s));
    }
    Ok(None)
}

fn one() -> f64 {
    1.0
}

fn one_i32() -> i32 {
    1
}

fn yes() -> bool {
    true
}

/// Represents a bus in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bus {
    pub index: i64,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub max_vm_pu: Option<f64>,
    pub min_vm_pu: Option<f64>,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>, // Added underscore to avoid conflict with Rust keyword
    pub vn_kv: f64,
    #[serde(default, deserialize_with = "from_number")]
    pub zone: Option<i64>,
}

/// Represents a generator in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Gen {
    pub bus: i64,
    pub controllable: Option<bool>,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub name: Option<String>,
    pub p_mw: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    pub sn_mva: Option<f64>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub vm_pu: f64,
    #[serde(default)]
    pub slack: bool,
    pub max_q_mvar: Option<f64>,
    pub min_q_mvar: Option<f64>,
}

/// Represents a load in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Load {
    pub bus: i64,
    #[serde(default)]
    pub const_i_percent: f64,
    #[serde(default)]
    pub const_z_percent: f64,
    pub controllable: Option<bool>,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub name: Option<String>,
    pub p_mw: f64,
    pub q_mvar: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    pub sn_mva: Option<f64>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

/// Represents a line in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Line {
    #[serde(default)]
    pub c_nf_per_km: f64,
    #[serde(default = "one")]
    pub df: f64,
    pub from_bus: i64,
    pub to_bus: i64,
    #[serde(default)]
    pub g_us_per_km: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub length_km: f64,
    #[serde(default)]
    pub max_i_ka: f64,
    pub max_loading_percent: Option<f64>,
    #[serde(default = "one_i32")]
    pub parallel: i32,
    pub r_ohm_per_km: f64,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub x_ohm_per_km: f64,
    pub name: Option<String>,
    pub std_type: Option<String>,
}

/// Represents a transformer in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transformer {
    #[serde(default = "one")]
    pub df: f64,
    pub hv_bus: i64,
    #[serde(default)]
    pub i0_percent: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub lv_bus: i64,
    pub max_loading_percent: Option<f64>,
    #[serde(default = "one_i32")]
    pub parallel: i32,
    #[serde(default)]
    pub pfe_kw: f64,
    #[serde(default)]
    pub shift_degree: f64,
    pub sn_mva: f64,
    #[serde(default)]
    pub tap_phase_shifter: bool,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    pub name: Option<String>,
    pub std_type: Option<String>,
    pub tap_side: Option<String>,
    pub tap_neutral: Option<f64>,
    pub tap_max: Option<f64>,
    pub tap_pos: Option<f64>,
    pub tap_min: Option<f64>,
    pub tap_step_degree: Option<f64>,
    pub tap_step_percent: Option<f64>,
}

/// Represents an external grid in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtGrid {
    pub bus: i64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(default)]
    pub va_degree: f64,
    #[serde(default = "one")]
    pub vm_pu: f64,
    pub name: Option<String>,
}

/// Represents the data from the sgen.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SGen {
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
    pub sn_mva: Option<f64>,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

/// Represents a shunt in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Shunt {
    pub bus: i64,
    pub q_mvar: f64,
    #[serde(default)]
    pub p_mw: f64,
    pub vn_kv: f64,
    #[serde(default = "one_i32")]
    pub step: i32,
    #[serde(default = "yes")]
    pub in_service: bool,
    pub name: Option<String>,
}

/// Represents a network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Network {
    pub r#gen: Option<Vec<Gen>>,
    pub bus: Vec<Bus>,
    pub load: Option<Vec<Load>>,
    pub line: Option<Vec<Line>>,
    pub trafo: Option<Vec<Transformer>>,
    pub shunt: Option<Vec<Shunt>>,
    pub ext_grid: Option<Vec<ExtGrid>>,
    pub sgen: Option<Vec<SGen>>,
    pub f_hz: f64,
    pub sn_mva: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            r#gen: None,
            bus: Vec::new(),
            load: None,
            line: None,
            trafo: None,
            shunt: None,
            ext_grid: None,
            sgen: None,
            f_hz: 50.0,
            sn_mva: 1.0,
        }
    }
}

/// Deserializes every record of a pandapower CSV table.
fn records_from_str<T: for<'de> Deserialize<'de>>(table: &str, content: &str) -> Result<Vec<T>> {
    // pandapower writes python booleans
    let s = content.replace("True", "true").replace("False", "false");
    let mut rdr = ReaderBuilder::new().from_reader(s.as_bytes());
    let headers = rdr.headers()?.to_owned();
    let mut records: Vec<T> = Vec::new();
    for (idx, i) in rdr.records().enumerate() {
        let record = i?;
        let elem = record
            .deserialize(Some(&headers))
            .map_err(|e| NetworkError::Table {
                table: table.to_owned(),
                what: format!("row {idx}: {e}"),
            })?;
        records.push(elem);
    }
    Ok(records)
}

/// Loads a pandapower CSV file into a vector of the specified type.
///
/// Returns `Ok(None)` when the file does not exist; optional tables are simply absent.
fn load_pandapower_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<Vec<T>>> {
    if !path.exists() {
        return Ok(None);
    }
    let table = path
        .file_stem()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    let records = records_from_str(&table, &buffer)?;
    Ok((!records.is_empty()).then_some(records))
}

/// Reads a CSV table from the given map and deserializes it into a vector of the specified type.
fn csv_from_map<T: for<'de> Deserialize<'de>>(
    map: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Vec<T>>> {
    let Some(s) = map.get(key) else {
        return Ok(None);
    };
    let records = records_from_str(key, s)?;
    Ok((!records.is_empty()).then_some(records))
}

fn missing(table: &str) -> NetworkError {
    NetworkError::Table {
        table: table.to_owned(),
        what: "required table not found".to_owned(),
    }
}

/// Macro to read network data from a CSV file.
macro_rules! read_csv_network {
    ($net:ident, $map:ident, { $($field:ident: $file:expr),* $(,)? }) => {
        $(
            $net.$field = csv_from_map(&$map, $file)?;
        )*
    };
}

/// Macro to read network data from a CSV file.
macro_rules! read_csv_network_folder {
    ($net:ident, $folder:ident, { $($field:ident: $file:expr),* $(,)? }) => {
        $(
            $net.$field = load_pandapower_csv(&$folder.join($file))?;
        )*
    };
}

/// Macro to read network data from a json key.
macro_rules! read_json_network {
    ($net:ident, $map:ident, { $($field:ident: $file:expr),* $(,)? }) => {
        $(
            $net.$field = load_pandapower_element_json(&$map, $file)?;
        )*
    };
}

/// Loads a CSV folder into a Network structure.
///
/// `bus.csv` is mandatory, every other table is optional. Base power and frequency
/// keep their defaults unless the caller overrides them.
pub fn load_csv_folder(folder: impl AsRef<Path>) -> Result<Network> {
    let folder = folder.as_ref();
    let mut net = Network::default();
    net.bus = load_pandapower_csv(&folder.join("bus.csv"))?.ok_or_else(|| missing("bus"))?;
    read_csv_network_folder!(net, folder, {
        r#gen: "gen.csv",
        line: "line.csv",
        shunt: "shunt.csv",
        trafo: "trafo.csv",
        ext_grid: "ext_grid.csv",
        load: "load.csv",
        sgen: "sgen.csv",
    });
    Ok(net)
}

/// Loads a network from a ZIP file containing CSV files.
pub fn load_csv_zip(name: impl AsRef<Path>) -> Result<Network> {
    let f = File::open(name)?;
    let mut zip = zip::ZipArchive::new(f)?;
    let mut map = HashMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;

        if file.is_file() {
            let mut s = String::with_capacity(file.size() as usize);
            file.read_to_string(&mut s)?;
            map.insert(file.name().to_owned(), s);
        }
    }

    let mut net = Network::default();
    net.bus = csv_from_map(&map, "bus.csv")?.ok_or_else(|| missing("bus"))?;
    read_csv_network!(net, map, {
        r#gen: "gen.csv",
        line: "line.csv",
        shunt: "shunt.csv",
        trafo: "trafo.csv",
        ext_grid: "ext_grid.csv",
        load: "load.csv",
        sgen: "sgen.csv",
    });
    Ok(net)
}

fn load_json_from_str(file_content: &str) -> Result<Map<String, Value>> {
    let parsed: Value = serde_json::from_str(file_content)?;
    match parsed {
        Value::Object(obj) => Ok(obj),
        _ => Err(NetworkError::Table {
            table: "json".to_owned(),
            what: "expected an object".to_owned(),
        }
        .into()),
    }
}

fn load_pandapower_element_json<T: serde::de::DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<T>>> {
    let Some(element) = object
        .get(key)
        .and_then(|v| v.as_object())
        .and_then(|v| v.get("_object"))
        .and_then(|v| v.as_str())
    else {
        return Ok(None);
    };
    let malformed = |what: &str| NetworkError::Table {
        table: key.to_owned(),
        what: what.to_owned(),
    };
    let map = load_json_from_str(element)?;

    let headers = map
        .get("columns")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed("no columns"))?;
    let rows = map
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed("no data"))?;
    // split-oriented frames carry their own index, positions are the fallback
    let index = map.get("index").and_then(|v| v.as_array());

    let mut elements = Vec::with_capacity(rows.len());
    for (pos, row) in rows.iter().enumerate() {
        let row = row.as_array().ok_or_else(|| malformed("row is not an array"))?;
        let mut obj: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.to_owned())))
            .collect();

        let idx = index
            .and_then(|ix| ix.get(pos))
            .cloned()
            .unwrap_or_else(|| Value::Number(serde_json::Number::from(pos as i64)));
        obj.insert("index".to_string(), idx);

        let elem: T = serde_json::from_value(Value::Object(obj))?;
        elements.push(elem);
    }

    Ok((!elements.is_empty()).then_some(elements))
}

/// Loads a network saved with `pandapower.to_json`.
pub fn load_pandapower_json(file_path: impl AsRef<Path>) -> Result<Network> {
    let content = fs::read_to_string(file_path)?;
    let map = load_json_from_str(&content)?;
    let object = map
        .get("_object")
        .and_then(|v| v.as_object())
        .ok_or_else(|| missing("_object"))?;

    let mut net = Network::default();
    net.bus = load_pandapower_element_json(object, "bus")?.ok_or_else(|| missing("bus"))?;
    read_json_network!(net, object, {
        r#gen: "gen",
        line: "line",
        shunt: "shunt",
        trafo: "trafo",
        ext_grid: "ext_grid",
        load: "load",
        sgen: "sgen",
    });
    if let Some(sn) = object.get("sn_mva").and_then(|v| v.as_f64()) {
        net.sn_mva = sn;
    }
    if let Some(f) = object.get("f_hz").and_then(|v| v.as_f64()) {
        net.f_hz = f;
    }

    Ok(net)
}
