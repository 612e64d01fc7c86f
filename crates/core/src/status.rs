//! IEEE 488.2 status reporting.
//!
//! The standard event status register (ESR) latches events such as command
//! and execution errors; the event status enable register (ESE) selects
//! which of them feed the ESB summary bit of the status byte (STB). The
//! service request enable register (SRE) selects which STB bits raise a
//! service request.

use scpi_engine_diagnostics::ErrorClass;

/// Standard event status register bits.
pub mod esr {
    /// Operation complete.
    pub const OPC: u8 = 0x01;
    /// Request control.
    pub const RQC: u8 = 0x02;
    /// Query error.
    pub const QYE: u8 = 0x04;
    /// Device-dependent error.
    pub const DDE: u8 = 0x08;
    /// Execution error.
    pub const EXE: u8 = 0x10;
    /// Command error.
    pub const CME: u8 = 0x20;
    /// User request.
    pub const URQ: u8 = 0x40;
    /// Power on.
    pub const PON: u8 = 0x80;
}

/// Status byte bits.
pub mod stb {
    /// Error/event queue not empty.
    pub const EAV: u8 = 0x04;
    /// Standard event status summary.
    pub const ESB: u8 = 0x20;
    /// Master summary status.
    pub const MSS: u8 = 0x40;
}

/// ESR bit latched by an error of the given class.
pub fn esr_bit(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::Command => esr::CME,
        ErrorClass::Execution => esr::EXE,
        ErrorClass::DeviceSpecific => esr::DDE,
        ErrorClass::Query => esr::QYE,
        ErrorClass::PowerOn => esr::PON,
        ErrorClass::UserRequest => esr::URQ,
        ErrorClass::RequestControl => esr::RQC,
        ErrorClass::OperationComplete => esr::OPC,
        _ => 0,
    }
}

/// ESR, ESE and SRE plus service-request edge tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRegisters {
    esr: u8,
    ese: u8,
    sre: u8,
    requesting: bool,
}

impl StatusRegisters {
    /// All registers cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ESR value.
    pub fn esr(&self) -> u8 {
        self.esr
    }

    /// Read and clear the ESR, as `*ESR?` does.
    pub fn take_esr(&mut self) -> u8 {
        std::mem::take(&mut self.esr)
    }

    /// Latch ESR bits.
    pub fn set_esr_bits(&mut self, bits: u8) {
        self.esr |= bits;
    }

    /// Latch the ESR bit for an error class.
    pub fn record_error(&mut self, class: ErrorClass) {
        self.set_esr_bits(esr_bit(class));
    }

    /// Current ESE value.
    pub fn ese(&self) -> u8 {
        self.ese
    }

    /// Set the ESE.
    pub fn set_ese(&mut self, value: u8) {
        self.ese = value;
    }

    /// Current SRE value.
    pub fn sre(&self) -> u8 {
        self.sre
    }

    /// Set the SRE. Bit 6 cannot be enabled.
    pub fn set_sre(&mut self, value: u8) {
        self.sre = value & !stb::MSS;
    }

    /// Compose the status byte.
    ///
    /// `errors_pending` drives the EAV bit.
    pub fn status_byte(&self, errors_pending: bool) -> u8 {
        let mut value = 0;
        if errors_pending {
            value |= stb::EAV;
        }
        if self.esr & self.ese != 0 {
            value |= stb::ESB;
        }
        if value & self.sre != 0 {
            value |= stb::MSS;
        }
        value
    }

    /// Track the service-request condition for a freshly composed status
    /// byte. Returns `true` when the request has just become active.
    pub fn poll_service_request(&mut self, status_byte: u8) -> bool {
        let active = status_byte & stb::MSS != 0;
        let rising = active && !self.requesting;
        self.requesting = active;
        rising
    }

    /// Clear the ESR (`*CLS`).
    pub fn clear_events(&mut self) {
        self.esr = 0;
    }

    /// Clear every register.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classes_map_to_esr_bits() {
        assert_eq!(esr_bit(ErrorClass::Command), 0x20);
        assert_eq!(esr_bit(ErrorClass::Execution), 0x10);
        assert_eq!(esr_bit(ErrorClass::DeviceSpecific), 0x08);
        assert_eq!(esr_bit(ErrorClass::Query), 0x04);
        assert_eq!(esr_bit(ErrorClass::None), 0);
    }

    #[test]
    fn esr_is_read_and_clear() {
        let mut s = StatusRegisters::new();
        s.record_error(ErrorClass::Command);
        s.record_error(ErrorClass::Execution);
        assert_eq!(s.take_esr(), 0x30);
        assert_eq!(s.esr(), 0);
    }

    #[test]
    fn status_byte_summaries() {
        let mut s = StatusRegisters::new();
        assert_eq!(s.status_byte(false), 0);
        assert_eq!(s.status_byte(true), stb::EAV);
        s.record_error(ErrorClass::Command);
        assert_eq!(s.status_byte(false), 0, "ESB needs ESE");
        s.set_ese(esr::CME);
        assert_eq!(s.status_byte(false), stb::ESB);
        s.set_sre(stb::ESB);
        assert_eq!(s.status_byte(false), stb::ESB | stb::MSS);
    }

    #[test]
    fn sre_bit6_is_masked() {
        let mut s = StatusRegisters::new();
        s.set_sre(0xFF);
        assert_eq!(s.sre(), 0xBF);
    }

    #[test]
    fn service_request_fires_on_rising_edge() {
        let mut s = StatusRegisters::new();
        s.set_sre(stb::EAV);
        let stb_on = s.status_byte(true);
        assert!(s.poll_service_request(stb_on));
        assert!(!s.poll_service_request(stb_on));
        let stb_off = s.status_byte(false);
        assert!(!s.poll_service_request(stb_off));
        assert!(s.poll_service_request(stb_on));
    }
}
