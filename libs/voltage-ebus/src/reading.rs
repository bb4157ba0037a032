//! Decoded telemetry readings

use std::fmt;

use chrono::NaiveDateTime;

use crate::message::Command;

/// Timestamp rendering used for published values
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Named quantities decoded from vendor commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Outside temperature reported by the burner control unit
    OutsideTemp,
    /// Outside temperature from the 0x16 broadcast service
    BroadcastOutsideTemp,
    HeatingEnabled,
    LeadWaterTemp,
    ReturnWaterTemp,
    WaterEnabled,
    WaterTemp,
    StorageTemp,
    WaterTargetTemp,
    Timestamp,
    /// Heating water temperature requested by the room controller
    HeatingSetpoint,
    /// Hot water temperature requested by the room controller
    WaterSetpoint,
    HeatingRequested,
    WaterRequested,
}

impl Metric {
    /// Stable key for logs and statistics
    pub fn name(&self) -> &'static str {
        match self {
            Metric::OutsideTemp => "outside_temp",
            Metric::BroadcastOutsideTemp => "broadcast_outside_temp",
            Metric::HeatingEnabled => "heating_enabled",
            Metric::LeadWaterTemp => "lead_water_temp",
            Metric::ReturnWaterTemp => "return_water_temp",
            Metric::WaterEnabled => "water_enabled",
            Metric::WaterTemp => "water_temp",
            Metric::StorageTemp => "storage_temp",
            Metric::WaterTargetTemp => "water_target_temp",
            Metric::Timestamp => "timestamp",
            Metric::HeatingSetpoint => "heating_setpoint",
            Metric::WaterSetpoint => "water_setpoint",
            Metric::HeatingRequested => "heating_requested",
            Metric::WaterRequested => "water_requested",
        }
    }

    /// Publish topic, `None` for quantities that are decoded but not published
    pub fn topic(&self) -> Option<&'static str> {
        match self {
            Metric::OutsideTemp => Some("vem/temp/outside"),
            Metric::HeatingEnabled => Some("vem/heating/enabled"),
            Metric::LeadWaterTemp => Some("vem/heating/water_temp_lead"),
            Metric::ReturnWaterTemp => Some("vem/heating/water_temp_return"),
            Metric::WaterEnabled => Some("vem/water/enabled"),
            Metric::WaterTemp => Some("vem/water/temp"),
            Metric::StorageTemp => Some("vem/water/storage_temp"),
            Metric::WaterTargetTemp => Some("vem/water/target_temp"),
            Metric::Timestamp => Some("vem/misc/timestamp"),
            // 0x11 already carries the outside temperature
            Metric::BroadcastOutsideTemp => None,
            Metric::HeatingSetpoint
            | Metric::WaterSetpoint
            | Metric::HeatingRequested
            | Metric::WaterRequested => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Number(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl ReadingValue {
    /// Payload text for the publish sink
    ///
    /// Numbers always keep a decimal point (`20.0`), booleans are lowercase.
    pub fn to_payload(&self) -> String {
        match self {
            ReadingValue::Number(value) => {
                let mut buffer = ryu::Buffer::new();
                buffer.format(*value).to_string()
            },
            ReadingValue::Bool(value) => value.to_string(),
            ReadingValue::Timestamp(value) => value.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_payload())
    }
}

/// One named value and the command that carried it
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub metric: Metric,
    pub value: ReadingValue,
    pub command: Command,
}

impl Reading {
    pub fn number(metric: Metric, value: f64, command: Command) -> Self {
        Self {
            metric,
            value: ReadingValue::Number(value),
            command,
        }
    }

    pub fn flag(metric: Metric, value: bool, command: Command) -> Self {
        Self {
            metric,
            value: ReadingValue::Bool(value),
            command,
        }
    }

    pub fn topic(&self) -> Option<&'static str> {
        self.metric.topic()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_number_payload_keeps_decimal_point() {
        assert_eq!(ReadingValue::Number(20.0).to_payload(), "20.0");
        assert_eq!(ReadingValue::Number(12.5).to_payload(), "12.5");
        assert_eq!(ReadingValue::Number(12.6640625).to_payload(), "12.6640625");
    }

    #[test]
    fn test_bool_payload() {
        assert_eq!(ReadingValue::Bool(true).to_payload(), "true");
        assert_eq!(ReadingValue::Bool(false).to_payload(), "false");
    }

    #[test]
    fn test_timestamp_payload() {
        let ts = NaiveDate::from_ymd_opt(2021, 6, 5)
            .unwrap()
            .and_hms_opt(14, 15, 30)
            .unwrap();
        assert_eq!(
            ReadingValue::Timestamp(ts).to_payload(),
            "05.06.2021 14:15:30"
        );
    }

    #[test]
    fn test_published_topics() {
        assert_eq!(Metric::OutsideTemp.topic(), Some("vem/temp/outside"));
        assert_eq!(Metric::Timestamp.topic(), Some("vem/misc/timestamp"));
        assert_eq!(Metric::BroadcastOutsideTemp.topic(), None);
        assert_eq!(Metric::HeatingSetpoint.topic(), None);
    }
}
