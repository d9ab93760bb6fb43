//! Known inquiry/setting payloads: their requests, reply shapes, decoders,
//! and the domain value mappings used by a handful of them.

use crate::frame::{PREAMBLE_INQUIRY, PREAMBLE_SETTING};

/// A firmware bank selector, corresponding to the suffix on a `QVFW` request
/// (`""`, `"2"`, `"3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareBank {
    Main,
    Two,
    Three,
}

impl FirmwareBank {
    pub fn request_suffix(self) -> &'static [u8] {
        match self {
            FirmwareBank::Main => b"",
            FirmwareBank::Two => b"2",
            FirmwareBank::Three => b"3",
        }
    }

    /// Suffix used in the published MQTT topic, e.g. `firmware_version2`.
    pub fn topic_suffix(self) -> &'static str {
        match self {
            FirmwareBank::Main => "",
            FirmwareBank::Two => "2",
            FirmwareBank::Three => "3",
        }
    }

    pub const ALL: [FirmwareBank; 3] = [FirmwareBank::Main, FirmwareBank::Two, FirmwareBank::Three];
}

/// Output-source priority, `QPIRI` field 16 / `POPnn` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSourcePriority {
    UtilitySolarBattery,
    SolarUtilityBattery,
    SolarBatteryUtility,
    Unknown3,
}

impl OutputSourcePriority {
    pub fn code(self) -> u8 {
        match self {
            OutputSourcePriority::UtilitySolarBattery => 0,
            OutputSourcePriority::SolarUtilityBattery => 1,
            OutputSourcePriority::SolarBatteryUtility => 2,
            OutputSourcePriority::Unknown3 => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputSourcePriority::UtilitySolarBattery => "utility_solar_battery",
            OutputSourcePriority::SolarUtilityBattery => "solar_utility_battery",
            OutputSourcePriority::SolarBatteryUtility => "solar_battery_utility",
            OutputSourcePriority::Unknown3 => "unknown_3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(OutputSourcePriority::UtilitySolarBattery),
            "1" => Some(OutputSourcePriority::SolarUtilityBattery),
            "2" => Some(OutputSourcePriority::SolarBatteryUtility),
            "3" => Some(OutputSourcePriority::Unknown3),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            OutputSourcePriority::UtilitySolarBattery,
            OutputSourcePriority::SolarUtilityBattery,
            OutputSourcePriority::SolarBatteryUtility,
            OutputSourcePriority::Unknown3,
        ]
        .into_iter()
        .find(|p| p.name() == name)
    }
}

/// Charger-source priority, `QPIRI` field 17 / `PCPnn` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerSourcePriority {
    UtilityFirst,
    SolarFirst,
    SolarAndUtility,
    OnlySolar,
}

impl ChargerSourcePriority {
    pub fn code(self) -> u8 {
        match self {
            ChargerSourcePriority::UtilityFirst => 0,
            ChargerSourcePriority::SolarFirst => 1,
            ChargerSourcePriority::SolarAndUtility => 2,
            ChargerSourcePriority::OnlySolar => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChargerSourcePriority::UtilityFirst => "utility_first",
            ChargerSourcePriority::SolarFirst => "solar_first",
            ChargerSourcePriority::SolarAndUtility => "solar_and_utility",
            ChargerSourcePriority::OnlySolar => "only_solar",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(ChargerSourcePriority::UtilityFirst),
            "1" => Some(ChargerSourcePriority::SolarFirst),
            "2" => Some(ChargerSourcePriority::SolarAndUtility),
            "3" => Some(ChargerSourcePriority::OnlySolar),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            ChargerSourcePriority::UtilityFirst,
            ChargerSourcePriority::SolarFirst,
            ChargerSourcePriority::SolarAndUtility,
            ChargerSourcePriority::OnlySolar,
        ]
        .into_iter()
        .find(|p| p.name() == name)
    }
}

/// Run mode, the single-letter `QMOD` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    PowerOn,
    Standby,
    Line,
    Battery,
    Fault,
    PowerSaving,
    Other(char),
}

impl RunMode {
    pub fn from_letter(letter: char) -> Self {
        match letter {
            'P' => RunMode::PowerOn,
            'S' => RunMode::Standby,
            'L' => RunMode::Line,
            'B' => RunMode::Battery,
            'F' => RunMode::Fault,
            'H' => RunMode::PowerSaving,
            other => RunMode::Other(other),
        }
    }

    pub fn as_str(&self) -> std::borrow::Cow<'static, str> {
        match self {
            RunMode::PowerOn => "power_on".into(),
            RunMode::Standby => "standby".into(),
            RunMode::Line => "line".into(),
            RunMode::Battery => "battery".into(),
            RunMode::Fault => "fault".into(),
            RunMode::PowerSaving => "power_saving".into(),
            RunMode::Other(c) => c.to_string().into(),
        }
    }
}

/// The kind of an outstanding query; dictates which decoder applies to the
/// eventual reply and how the request payload/preamble are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    ProtocolId,
    Serial,
    Firmware(FirmwareBank),
    Ratings,
    Flags,
    Telemetry,
    Mode,
    Warnings,
    SetChargerPriority(ChargerSourcePriority),
    SetOutputPriority(OutputSourcePriority),
}

impl QueryKind {
    pub fn preamble(&self) -> [u8; 2] {
        match self {
            QueryKind::SetChargerPriority(_) | QueryKind::SetOutputPriority(_) => PREAMBLE_SETTING,
            _ => PREAMBLE_INQUIRY,
        }
    }

    pub fn request_payload(&self) -> Vec<u8> {
        match self {
            QueryKind::ProtocolId => b"QPI".to_vec(),
            QueryKind::Serial => b"QID".to_vec(),
            QueryKind::Firmware(bank) => {
                let mut p = b"QVFW".to_vec();
                p.extend_from_slice(bank.request_suffix());
                p
            }
            QueryKind::Ratings => b"QPIRI".to_vec(),
            QueryKind::Flags => b"QFLAG".to_vec(),
            QueryKind::Telemetry => b"QPIGS".to_vec(),
            QueryKind::Mode => b"QMOD".to_vec(),
            QueryKind::Warnings => b"QPIWS".to_vec(),
            QueryKind::SetChargerPriority(p) => format!("PCP{:02}", p.code()).into_bytes(),
            QueryKind::SetOutputPriority(p) => format!("POP{:02}", p.code()).into_bytes(),
        }
    }
}

/// Rated-parameters decode (`QPIRI`). All 28 known fields are retained even
/// though only a subset is republished, mirroring the reference decoder.
#[derive(Debug, Clone)]
pub struct Ratings {
    pub grid_rating_voltage: String,
    pub grid_rating_current_maybe: String,
    pub output_rating_voltage: String,
    pub output_rating_frequency: String,
    pub output_rating_current_maybe: String,
    pub output_rating_va: String,
    pub output_rating_w: String,
    pub battery_rating_voltage: String,
    pub battery_recharge_voltage: f64,
    pub battery_under_voltage: f64,
    pub battery_bulk_voltage: f64,
    pub battery_float_voltage: f64,
    pub battery_type: String,
    pub max_ac_charging_current: f64,
    pub current_max_charging_current: f64,
    pub input_voltage_range: String,
    pub output_source_priority: OutputSourcePriority,
    pub charger_source_priority: ChargerSourcePriority,
    pub parallel_max_num: String,
    pub machine_type: String,
    pub topology: String,
    pub output_mode: String,
    pub battery_redischarge_voltage: String,
    pub pv_ok_condition_for_parallel: String,
    pub pv_power_balance: String,
    pub field_25: String,
    pub field_26: String,
    pub field_27: String,
}

impl Ratings {
    /// Only these are republished to MQTT in the core.
    pub fn publish_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "battery_recharge_voltage",
                self.battery_recharge_voltage.to_string(),
            ),
            (
                "max_ac_charging_current",
                self.max_ac_charging_current.to_string(),
            ),
            (
                "current_max_charging_current",
                self.current_max_charging_current.to_string(),
            ),
            (
                "output_source_priority",
                self.output_source_priority.name().to_string(),
            ),
            (
                "charger_source_priority",
                self.charger_source_priority.name().to_string(),
            ),
            ("output_mode", self.output_mode.clone()),
        ]
    }
}

/// Live telemetry decode (`QPIGS`).
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub grid_voltage: f64,
    pub grid_frequency: f64,
    pub output_voltage: f64,
    pub output_frequency: f64,
    pub output_va: f64,
    pub output_w: f64,
    pub output_load_percent: f64,
    pub bus_voltage: f64,
    pub battery_voltage: f64,
    pub battery_charging_current: f64,
    pub battery_soc: f64,
    pub inverter_heatsink_temp: f64,
    pub field_12: String,
    pub field_13: String,
    pub battery_voltage_scc_maybe: String,
    pub battery_discharging_current: f64,
    pub device_status_bitmap: String,
    pub field_17: String,
    pub field_18: String,
    pub field_19: String,
    pub field_20: String,
}

impl Telemetry {
    pub fn publish_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("grid_voltage", self.grid_voltage.to_string()),
            ("grid_frequency", self.grid_frequency.to_string()),
            ("output_voltage", self.output_voltage.to_string()),
            ("output_frequency", self.output_frequency.to_string()),
            ("output_va", self.output_va.to_string()),
            ("output_w", self.output_w.to_string()),
            ("output_load_percent", self.output_load_percent.to_string()),
            ("bus_voltage", self.bus_voltage.to_string()),
            ("battery_voltage", self.battery_voltage.to_string()),
            (
                "battery_charging_current",
                self.battery_charging_current.to_string(),
            ),
            ("battery_SOC", self.battery_soc.to_string()),
            (
                "inverter_heatsink_temp",
                self.inverter_heatsink_temp.to_string(),
            ),
            (
                "battery_discharging_current",
                self.battery_discharging_current.to_string(),
            ),
        ]
    }
}

/// Enabled/disabled feature flags (`QFLAG`). Decoded but never republished
/// in the core; kept as the raw `(E...D...` body.
#[derive(Debug, Clone)]
pub struct Flags {
    pub raw: String,
}

/// 36-bit warning bitmap (`QPIWS`). Decoded but never republished in the
/// core.
#[derive(Debug, Clone)]
pub struct Warnings {
    pub raw: String,
}

impl Warnings {
    pub fn bit(&self, n: usize) -> bool {
        self.raw.as_bytes().get(n) == Some(&b'1')
    }
}

/// The result of decoding one reply payload against the kind of query it
/// answers.
#[derive(Debug, Clone)]
pub enum DecodedReply {
    Nak,
    Ack,
    ProtocolVersion(u8),
    Serial(String),
    Firmware { bank: FirmwareBank, version: String },
    Ratings(Ratings),
    Flags(Flags),
    Telemetry(Telemetry),
    Mode(RunMode),
    Warnings(Warnings),
}

/// A reply didn't match the shape its query kind requires.
#[derive(Debug, Clone)]
pub struct InvalidShape(pub String);

impl std::fmt::Display for InvalidShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InvalidShape {}

fn invalid(msg: impl Into<String>) -> InvalidShape {
    InvalidShape(msg.into())
}

/// Decodes `payload` (the bytes between the preamble and the CRC) according
/// to the kind of query it is a reply to.
///
/// `(NAK` is recognized uniformly across every kind and returned as
/// `DecodedReply::Nak` rather than an error: NAKs are logged, do not count
/// toward the invalid-response ceiling, and are never retried.
pub fn decode_reply(kind: &QueryKind, payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    if payload == b"(NAK" {
        return Ok(DecodedReply::Nak);
    }

    match kind {
        QueryKind::SetChargerPriority(_) | QueryKind::SetOutputPriority(_) => {
            if payload == b"(ACK" {
                Ok(DecodedReply::Ack)
            } else {
                Err(invalid(format!(
                    "expected (ACK or (NAK to a setting, got {:?}",
                    String::from_utf8_lossy(payload)
                )))
            }
        }
        QueryKind::ProtocolId => decode_protocol_id(payload),
        QueryKind::Serial => decode_serial(payload),
        QueryKind::Firmware(bank) => decode_firmware(*bank, payload),
        QueryKind::Ratings => decode_ratings(payload),
        QueryKind::Flags => decode_flags(payload),
        QueryKind::Telemetry => decode_telemetry(payload),
        QueryKind::Mode => decode_mode(payload),
        QueryKind::Warnings => decode_warnings(payload),
    }
}

fn ascii_body(payload: &[u8]) -> Result<&str, InvalidShape> {
    if payload.first() != Some(&b'(') {
        return Err(invalid(format!(
            "reply does not start with '(': {:?}",
            String::from_utf8_lossy(payload)
        )));
    }
    std::str::from_utf8(payload).map_err(|_| invalid("reply is not valid ASCII"))
}

fn decode_protocol_id(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    if body.len() == 5 && &body[0..3] == "(PI" {
        let version: u8 = body[3..5]
            .parse()
            .map_err(|_| invalid("QPI reply protocol version is not numeric"))?;
        Ok(DecodedReply::ProtocolVersion(version))
    } else {
        Err(invalid(format!("invalid QPI reply: {body:?}")))
    }
}

fn decode_serial(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    if body.len() >= 2 {
        Ok(DecodedReply::Serial(body[1..].to_string()))
    } else {
        Err(invalid(format!("invalid QID reply: {body:?}")))
    }
}

fn decode_firmware(bank: FirmwareBank, payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    let suffix = std::str::from_utf8(bank.request_suffix()).unwrap();
    let prefixed = format!("(VERFW{suffix}:");
    let bare = "(VERFW:";

    let version = if let Some(v) = body.strip_prefix(&prefixed) {
        v
    } else if let Some(v) = body.strip_prefix(bare) {
        v
    } else {
        return Err(invalid(format!(
            "invalid QVFW{suffix} reply: {body:?}"
        )));
    };

    Ok(DecodedReply::Firmware {
        bank,
        version: version.to_string(),
    })
}

fn decode_mode(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    let mut chars = body.chars();
    let open = chars.next();
    let letter = chars.next();
    if open == Some('(') && letter.is_some() && chars.next().is_none() {
        Ok(DecodedReply::Mode(RunMode::from_letter(letter.unwrap())))
    } else {
        Err(invalid(format!("invalid QMOD reply: {body:?}")))
    }
}

fn decode_flags(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    Ok(DecodedReply::Flags(Flags {
        raw: body[1..].to_string(),
    }))
}

fn decode_warnings(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    Ok(DecodedReply::Warnings(Warnings {
        raw: body[1..].to_string(),
    }))
}

fn parse_f64(fields: &[&str], index: usize, what: &str) -> Result<f64, InvalidShape> {
    fields
        .get(index)
        .ok_or_else(|| invalid(format!("{what}: missing field {index}")))?
        .parse()
        .map_err(|_| invalid(format!("{what}: field {index} is not numeric")))
}

fn field(fields: &[&str], index: usize, what: &str) -> Result<String, InvalidShape> {
    fields
        .get(index)
        .map(|s| s.to_string())
        .ok_or_else(|| invalid(format!("{what}: missing field {index}")))
}

fn decode_ratings(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    if body.len() < 70 {
        return Err(invalid(format!(
            "QPIRI reply too short ({} bytes)",
            body.len()
        )));
    }
    let fields: Vec<&str> = body[1..].split(' ').collect();
    if fields.len() < 28 {
        return Err(invalid(format!(
            "QPIRI reply has only {} fields, need at least 28",
            fields.len()
        )));
    }

    let output_source_priority = OutputSourcePriority::from_code(&fields[16])
        .ok_or_else(|| invalid(format!("QPIRI: unknown output source priority {:?}", fields[16])))?;
    let charger_source_priority = ChargerSourcePriority::from_code(&fields[17])
        .ok_or_else(|| invalid(format!("QPIRI: unknown charger source priority {:?}", fields[17])))?;

    Ok(DecodedReply::Ratings(Ratings {
        grid_rating_voltage: field(&fields, 0, "QPIRI")?,
        grid_rating_current_maybe: field(&fields, 1, "QPIRI")?,
        output_rating_voltage: field(&fields, 2, "QPIRI")?,
        output_rating_frequency: field(&fields, 3, "QPIRI")?,
        output_rating_current_maybe: field(&fields, 4, "QPIRI")?,
        output_rating_va: field(&fields, 5, "QPIRI")?,
        output_rating_w: field(&fields, 6, "QPIRI")?,
        battery_rating_voltage: field(&fields, 7, "QPIRI")?,
        battery_recharge_voltage: parse_f64(&fields, 8, "QPIRI")?,
        battery_under_voltage: parse_f64(&fields, 9, "QPIRI")?,
        battery_bulk_voltage: parse_f64(&fields, 10, "QPIRI")?,
        battery_float_voltage: parse_f64(&fields, 11, "QPIRI")?,
        battery_type: field(&fields, 12, "QPIRI")?,
        max_ac_charging_current: parse_f64(&fields, 13, "QPIRI")?,
        current_max_charging_current: parse_f64(&fields, 14, "QPIRI")?,
        input_voltage_range: field(&fields, 15, "QPIRI")?,
        output_source_priority,
        charger_source_priority,
        parallel_max_num: field(&fields, 18, "QPIRI")?,
        machine_type: field(&fields, 19, "QPIRI")?,
        topology: field(&fields, 20, "QPIRI")?,
        output_mode: field(&fields, 21, "QPIRI")?,
        battery_redischarge_voltage: field(&fields, 22, "QPIRI")?,
        pv_ok_condition_for_parallel: field(&fields, 23, "QPIRI")?,
        pv_power_balance: field(&fields, 24, "QPIRI")?,
        field_25: fields.get(25).map(|s| s.to_string()).unwrap_or_default(),
        field_26: fields.get(26).map(|s| s.to_string()).unwrap_or_default(),
        field_27: fields.get(27).map(|s| s.to_string()).unwrap_or_default(),
    }))
}

fn decode_telemetry(payload: &[u8]) -> Result<DecodedReply, InvalidShape> {
    let body = ascii_body(payload)?;
    if body.len() < 70 {
        return Err(invalid(format!(
            "QPIGS reply too short ({} bytes)",
            body.len()
        )));
    }
    let fields: Vec<&str> = body[1..].split(' ').collect();
    if fields.len() < 21 {
        return Err(invalid(format!(
            "QPIGS reply has only {} fields, need at least 21",
            fields.len()
        )));
    }

    Ok(DecodedReply::Telemetry(Telemetry {
        grid_voltage: parse_f64(&fields, 0, "QPIGS")?,
        grid_frequency: parse_f64(&fields, 1, "QPIGS")?,
        output_voltage: parse_f64(&fields, 2, "QPIGS")?,
        output_frequency: parse_f64(&fields, 3, "QPIGS")?,
        output_va: parse_f64(&fields, 4, "QPIGS")?,
        output_w: parse_f64(&fields, 5, "QPIGS")?,
        output_load_percent: parse_f64(&fields, 6, "QPIGS")?,
        bus_voltage: parse_f64(&fields, 7, "QPIGS")?,
        battery_voltage: parse_f64(&fields, 8, "QPIGS")?,
        battery_charging_current: parse_f64(&fields, 9, "QPIGS")?,
        battery_soc: parse_f64(&fields, 10, "QPIGS")?,
        inverter_heatsink_temp: parse_f64(&fields, 11, "QPIGS")?,
        field_12: field(&fields, 12, "QPIGS")?,
        field_13: field(&fields, 13, "QPIGS")?,
        battery_voltage_scc_maybe: field(&fields, 14, "QPIGS")?,
        battery_discharging_current: parse_f64(&fields, 15, "QPIGS")?,
        device_status_bitmap: field(&fields, 16, "QPIGS")?,
        field_17: field(&fields, 17, "QPIGS")?,
        field_18: field(&fields, 18, "QPIGS")?,
        field_19: field(&fields, 19, "QPIGS")?,
        field_20: field(&fields, 20, "QPIGS")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qpi_decodes_protocol_version() {
        match decode_reply(&QueryKind::ProtocolId, b"(PI30").unwrap() {
            DecodedReply::ProtocolVersion(30) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn qid_decodes_serial() {
        match decode_reply(&QueryKind::Serial, b"(96332309100452").unwrap() {
            DecodedReply::Serial(s) => assert_eq!(s, "96332309100452"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn qvfw_accepts_suffixed_and_bare_reply() {
        match decode_reply(&QueryKind::Firmware(FirmwareBank::Main), b"(VERFW:00072.03").unwrap() {
            DecodedReply::Firmware { version, .. } => assert_eq!(version, "00072.03"),
            other => panic!("unexpected: {other:?}"),
        }
        match decode_reply(&QueryKind::Firmware(FirmwareBank::Two), b"(VERFW2:00072.15").unwrap() {
            DecodedReply::Firmware { version, bank, .. } => {
                assert_eq!(version, "00072.15");
                assert_eq!(bank, FirmwareBank::Two);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn qpigs_decodes_scenario_c() {
        let payload = b"(118.9 60.0 118.9 60.0 1545 1424 023 232 53.60 000 099 0040 00.0 000.0 00.00 00000 00010000 00 00 00000 010";
        match decode_reply(&QueryKind::Telemetry, payload).unwrap() {
            DecodedReply::Telemetry(t) => {
                assert_eq!(t.grid_voltage, 118.9);
                assert_eq!(t.output_w, 1424.0);
                assert_eq!(t.battery_soc, 99.0);
                assert_eq!(t.battery_voltage, 53.60);
                assert_eq!(t.inverter_heatsink_temp, 40.0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn qmod_maps_letters() {
        match decode_reply(&QueryKind::Mode, b"(B").unwrap() {
            DecodedReply::Mode(RunMode::Battery) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn nak_short_circuits_any_kind() {
        assert!(matches!(
            decode_reply(&QueryKind::Ratings, b"(NAK").unwrap(),
            DecodedReply::Nak
        ));
    }

    #[test]
    fn set_charge_priority_encodes_two_digit_code() {
        let kind = QueryKind::SetChargerPriority(ChargerSourcePriority::SolarFirst);
        assert_eq!(kind.request_payload(), b"PCP01");
    }

    #[test]
    fn decoder_rejects_too_few_fields() {
        let err = decode_reply(&QueryKind::Telemetry, b"(only one field").unwrap_err();
        assert!(err.0.contains("QPIGS"));
    }
}
