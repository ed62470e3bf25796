//! Well-known INDI property and element names
//!
//! The INDI standard-property catalogue gives stable identifiers to the
//! properties most drivers expose (`CONNECTION`, `EQUATORIAL_EOD_COORD`,
//! `CCD_EXPOSURE`, ...). Both tables below map wire identifiers into typed
//! names, falling back to `Other` for anything a driver invents. The
//! validator uses [`PropertyName::known_values`] to flag element names that
//! do not belong to the property they arrived under.

use std::fmt;

macro_rules! wire_names {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum $name {
            $($variant,)+
            /// Any identifier outside the well-known table
            Other(String),
        }

        impl $name {
            /// Map a wire identifier into the table
            pub fn parse(s: &str) -> Self {
                match s {
                    $($wire => $name::$variant,)+
                    _ => $name::Other(s.to_string()),
                }
            }

            /// The wire spelling
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(s) => s,
                }
            }

            /// Whether the identifier is in the well-known table
            pub fn is_known(&self) -> bool {
                !matches!(self, $name::Other(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::parse(s)
            }
        }
    };
}

wire_names! {
    /// A property identifier, either from the standard-property catalogue
    /// or an opaque driver-specific string
    PropertyName {
        Connection => "CONNECTION",
        DevicePort => "DEVICE_PORT",
        ActiveDevices => "ACTIVE_DEVICES",
        ConfigProcess => "CONFIG_PROCESS",
        DriverInfo => "DRIVER_INFO",
        DebugToggle => "DEBUG",
        Simulation => "SIMULATION",
        PollingPeriod => "POLLING_PERIOD",
        TimeUtc => "TIME_UTC",
        GeographicCoord => "GEOGRAPHIC_COORD",
        Atmosphere => "ATMOSPHERE",
        UploadMode => "UPLOAD_MODE",
        UploadSettings => "UPLOAD_SETTINGS",
        EquatorialEodCoord => "EQUATORIAL_EOD_COORD",
        EquatorialCoord => "EQUATORIAL_COORD",
        HorizontalCoord => "HORIZONTAL_COORD",
        TargetEodCoord => "TARGET_EOD_COORD",
        OnCoordSet => "ON_COORD_SET",
        TelescopeMotionNs => "TELESCOPE_MOTION_NS",
        TelescopeMotionWe => "TELESCOPE_MOTION_WE",
        TelescopeTimedGuideNs => "TELESCOPE_TIMED_GUIDE_NS",
        TelescopeTimedGuideWe => "TELESCOPE_TIMED_GUIDE_WE",
        TelescopeSlewRate => "TELESCOPE_SLEW_RATE",
        TelescopePark => "TELESCOPE_PARK",
        TelescopeAbortMotion => "TELESCOPE_ABORT_MOTION",
        TelescopeTrackMode => "TELESCOPE_TRACK_MODE",
        TelescopeTrackState => "TELESCOPE_TRACK_STATE",
        TelescopeInfo => "TELESCOPE_INFO",
        TelescopePierSide => "TELESCOPE_PIER_SIDE",
        CcdExposure => "CCD_EXPOSURE",
        CcdAbortExposure => "CCD_ABORT_EXPOSURE",
        CcdFrame => "CCD_FRAME",
        CcdTemperature => "CCD_TEMPERATURE",
        CcdCooler => "CCD_COOLER",
        CcdCoolerPower => "CCD_COOLER_POWER",
        CcdFrameType => "CCD_FRAME_TYPE",
        CcdBinning => "CCD_BINNING",
        CcdCompression => "CCD_COMPRESSION",
        CcdFrameReset => "CCD_FRAME_RESET",
        CcdInfo => "CCD_INFO",
        CcdCfa => "CCD_CFA",
        Ccd1 => "CCD1",
        Ccd2 => "CCD2",
        GuiderExposure => "GUIDER_EXPOSURE",
        FilterSlot => "FILTER_SLOT",
        FilterName => "FILTER_NAME",
        FocusSpeed => "FOCUS_SPEED",
        FocusMotion => "FOCUS_MOTION",
        FocusTimer => "FOCUS_TIMER",
        AbsFocusPosition => "ABS_FOCUS_POSITION",
        RelFocusPosition => "REL_FOCUS_POSITION",
        FocusMax => "FOCUS_MAX",
        FocusReverseMotion => "FOCUS_REVERSE_MOTION",
        FocusAbortMotion => "FOCUS_ABORT_MOTION",
        DomeSpeed => "DOME_SPEED",
        DomeMotion => "DOME_MOTION",
        DomeTimer => "DOME_TIMER",
        RelDomePosition => "REL_DOME_POSITION",
        AbsDomePosition => "ABS_DOME_POSITION",
        DomeAbortMotion => "DOME_ABORT_MOTION",
        DomeShutter => "DOME_SHUTTER",
        DomeGoto => "DOME_GOTO",
        DomeParams => "DOME_PARAMS",
        DomeAutosync => "DOME_AUTOSYNC",
    }
}

wire_names! {
    /// An element identifier inside a property vector
    ValueName {
        Connect => "CONNECT",
        Disconnect => "DISCONNECT",
        Port => "PORT",
        ActiveTelescope => "ACTIVE_TELESCOPE",
        ActiveCcd => "ACTIVE_CCD",
        ActiveFilter => "ACTIVE_FILTER",
        ActiveFocuser => "ACTIVE_FOCUSER",
        ActiveDome => "ACTIVE_DOME",
        ActiveGps => "ACTIVE_GPS",
        ConfigLoad => "CONFIG_LOAD",
        ConfigSave => "CONFIG_SAVE",
        ConfigDefault => "CONFIG_DEFAULT",
        ConfigPurge => "CONFIG_PURGE",
        DriverName => "DRIVER_NAME",
        DriverExec => "DRIVER_EXEC",
        DriverVersion => "DRIVER_VERSION",
        DriverInterface => "DRIVER_INTERFACE",
        Enable => "ENABLE",
        Disable => "DISABLE",
        PeriodMs => "PERIOD_MS",
        Utc => "UTC",
        Offset => "OFFSET",
        Lat => "LAT",
        Long => "LONG",
        Elev => "ELEV",
        Temperature => "TEMPERATURE",
        Pressure => "PRESSURE",
        Humidity => "HUMIDITY",
        UploadClient => "UPLOAD_CLIENT",
        UploadLocal => "UPLOAD_LOCAL",
        UploadBoth => "UPLOAD_BOTH",
        UploadDir => "UPLOAD_DIR",
        UploadPrefix => "UPLOAD_PREFIX",
        Ra => "RA",
        Dec => "DEC",
        Alt => "ALT",
        Az => "AZ",
        Slew => "SLEW",
        Track => "TRACK",
        Sync => "SYNC",
        MotionNorth => "MOTION_NORTH",
        MotionSouth => "MOTION_SOUTH",
        MotionWest => "MOTION_WEST",
        MotionEast => "MOTION_EAST",
        TimedGuideN => "TIMED_GUIDE_N",
        TimedGuideS => "TIMED_GUIDE_S",
        TimedGuideW => "TIMED_GUIDE_W",
        TimedGuideE => "TIMED_GUIDE_E",
        SlewGuide => "SLEW_GUIDE",
        SlewCentering => "SLEW_CENTERING",
        SlewFind => "SLEW_FIND",
        SlewMax => "SLEW_MAX",
        Park => "PARK",
        Unpark => "UNPARK",
        AbortMotion => "ABORT_MOTION",
        TrackSidereal => "TRACK_SIDEREAL",
        TrackSolar => "TRACK_SOLAR",
        TrackLunar => "TRACK_LUNAR",
        TrackCustom => "TRACK_CUSTOM",
        TrackOn => "TRACK_ON",
        TrackOff => "TRACK_OFF",
        TelescopeAperture => "TELESCOPE_APERTURE",
        TelescopeFocalLength => "TELESCOPE_FOCAL_LENGTH",
        GuiderAperture => "GUIDER_APERTURE",
        GuiderFocalLength => "GUIDER_FOCAL_LENGTH",
        PierEast => "PIER_EAST",
        PierWest => "PIER_WEST",
        CcdExposureValue => "CCD_EXPOSURE_VALUE",
        Abort => "ABORT",
        FrameX => "X",
        FrameY => "Y",
        Width => "WIDTH",
        Height => "HEIGHT",
        CcdTemperatureValue => "CCD_TEMPERATURE_VALUE",
        CoolerOn => "COOLER_ON",
        CoolerOff => "COOLER_OFF",
        CcdCoolerValue => "CCD_COOLER_VALUE",
        FrameLight => "FRAME_LIGHT",
        FrameBias => "FRAME_BIAS",
        FrameDark => "FRAME_DARK",
        FrameFlat => "FRAME_FLAT",
        HorBin => "HOR_BIN",
        VerBin => "VER_BIN",
        CcdCompress => "CCD_COMPRESS",
        CcdRaw => "CCD_RAW",
        Reset => "RESET",
        CcdMaxX => "CCD_MAX_X",
        CcdMaxY => "CCD_MAX_Y",
        CcdPixelSize => "CCD_PIXEL_SIZE",
        CcdPixelSizeX => "CCD_PIXEL_SIZE_X",
        CcdPixelSizeY => "CCD_PIXEL_SIZE_Y",
        CcdBitsPerPixel => "CCD_BITSPERPIXEL",
        CfaOffsetX => "CFA_OFFSET_X",
        CfaOffsetY => "CFA_OFFSET_Y",
        CfaType => "CFA_TYPE",
        Ccd1 => "CCD1",
        Ccd2 => "CCD2",
        GuiderExposureValue => "GUIDER_EXPOSURE_VALUE",
        FilterSlotValue => "FILTER_SLOT_VALUE",
        FilterNameValue => "FILTER_NAME_VALUE",
        FocusSpeedValue => "FOCUS_SPEED_VALUE",
        FocusInward => "FOCUS_INWARD",
        FocusOutward => "FOCUS_OUTWARD",
        FocusTimerValue => "FOCUS_TIMER_VALUE",
        FocusAbsolutePosition => "FOCUS_ABSOLUTE_POSITION",
        FocusRelativePosition => "FOCUS_RELATIVE_POSITION",
        FocusMaxValue => "FOCUS_MAX_VALUE",
        Enabled => "ENABLED",
        Disabled => "DISABLED",
        DomeSpeedValue => "DOME_SPEED_VALUE",
        DomeCw => "DOME_CW",
        DomeCcw => "DOME_CCW",
        DomeTimerValue => "DOME_TIMER_VALUE",
        DomeRelativePosition => "DOME_RELATIVE_POSITION",
        DomeAbsolutePosition => "DOME_ABSOLUTE_POSITION",
        ShutterOpen => "SHUTTER_OPEN",
        ShutterClose => "SHUTTER_CLOSE",
        DomeHome => "DOME_HOME",
        DomePark => "DOME_PARK",
        HomePosition => "HOME_POSITION",
        ParkPosition => "PARK_POSITION",
        AutosyncThreshold => "AUTOSYNC_THRESHOLD",
        DomeAutosyncEnable => "DOME_AUTOSYNC_ENABLE",
        DomeAutosyncDisable => "DOME_AUTOSYNC_DISABLE",
    }
}

impl PropertyName {
    /// The element names the standard-property catalogue permits under this
    /// property, or `None` when the property is not constrained (unknown
    /// properties and known ones without a fixed element set).
    pub fn known_values(&self) -> Option<&'static [ValueName]> {
        use ValueName::*;
        Some(match self {
            PropertyName::Connection => &[Connect, Disconnect],
            PropertyName::DevicePort => &[Port],
            PropertyName::ActiveDevices => &[
                ActiveTelescope,
                ActiveCcd,
                ActiveFilter,
                ActiveFocuser,
                ActiveDome,
                ActiveGps,
            ],
            PropertyName::ConfigProcess => {
                &[ConfigLoad, ConfigSave, ConfigDefault, ConfigPurge]
            }
            PropertyName::DriverInfo => {
                &[DriverName, DriverExec, DriverVersion, DriverInterface]
            }
            PropertyName::DebugToggle => &[Enable, Disable],
            PropertyName::Simulation => &[Enable, Disable],
            PropertyName::PollingPeriod => &[PeriodMs],
            PropertyName::TimeUtc => &[Utc, Offset],
            PropertyName::GeographicCoord => &[Lat, Long, Elev],
            PropertyName::Atmosphere => &[Temperature, Pressure, Humidity],
            PropertyName::UploadMode => &[UploadClient, UploadLocal, UploadBoth],
            PropertyName::UploadSettings => &[UploadDir, UploadPrefix],
            PropertyName::EquatorialEodCoord
            | PropertyName::EquatorialCoord
            | PropertyName::TargetEodCoord => &[Ra, Dec],
            PropertyName::HorizontalCoord => &[Alt, Az],
            PropertyName::OnCoordSet => &[Slew, Track, Sync],
            PropertyName::TelescopeMotionNs => &[MotionNorth, MotionSouth],
            PropertyName::TelescopeMotionWe => &[MotionWest, MotionEast],
            PropertyName::TelescopeTimedGuideNs => &[TimedGuideN, TimedGuideS],
            PropertyName::TelescopeTimedGuideWe => &[TimedGuideW, TimedGuideE],
            PropertyName::TelescopeSlewRate => {
                &[SlewGuide, SlewCentering, SlewFind, SlewMax]
            }
            PropertyName::TelescopePark => &[Park, Unpark],
            PropertyName::TelescopeAbortMotion => &[AbortMotion],
            PropertyName::TelescopeTrackMode => {
                &[TrackSidereal, TrackSolar, TrackLunar, TrackCustom]
            }
            PropertyName::TelescopeTrackState => &[TrackOn, TrackOff],
            PropertyName::TelescopeInfo => &[
                TelescopeAperture,
                TelescopeFocalLength,
                GuiderAperture,
                GuiderFocalLength,
            ],
            PropertyName::TelescopePierSide => &[PierEast, PierWest],
            PropertyName::CcdExposure => &[CcdExposureValue],
            PropertyName::CcdAbortExposure => &[Abort],
            PropertyName::CcdFrame => &[FrameX, FrameY, Width, Height],
            PropertyName::CcdTemperature => &[CcdTemperatureValue],
            PropertyName::CcdCooler => &[CoolerOn, CoolerOff],
            PropertyName::CcdCoolerPower => &[CcdCoolerValue],
            PropertyName::CcdFrameType => &[FrameLight, FrameBias, FrameDark, FrameFlat],
            PropertyName::CcdBinning => &[HorBin, VerBin],
            PropertyName::CcdCompression => &[CcdCompress, CcdRaw],
            PropertyName::CcdFrameReset => &[Reset],
            PropertyName::CcdInfo => &[
                CcdMaxX,
                CcdMaxY,
                CcdPixelSize,
                CcdPixelSizeX,
                CcdPixelSizeY,
                CcdBitsPerPixel,
            ],
            PropertyName::CcdCfa => &[CfaOffsetX, CfaOffsetY, CfaType],
            PropertyName::Ccd1 => &[Ccd1],
            PropertyName::Ccd2 => &[Ccd2],
            PropertyName::GuiderExposure => &[GuiderExposureValue],
            PropertyName::FilterSlot => &[FilterSlotValue],
            PropertyName::FilterName => &[FilterNameValue],
            PropertyName::FocusSpeed => &[FocusSpeedValue],
            PropertyName::FocusMotion => &[FocusInward, FocusOutward],
            PropertyName::FocusTimer => &[FocusTimerValue],
            PropertyName::AbsFocusPosition => &[FocusAbsolutePosition],
            PropertyName::RelFocusPosition => &[FocusRelativePosition],
            PropertyName::FocusMax => &[FocusMaxValue],
            PropertyName::FocusReverseMotion => &[Enabled, Disabled],
            PropertyName::FocusAbortMotion => &[Abort],
            PropertyName::DomeSpeed => &[DomeSpeedValue],
            PropertyName::DomeMotion => &[DomeCw, DomeCcw],
            PropertyName::DomeTimer => &[DomeTimerValue],
            PropertyName::RelDomePosition => &[DomeRelativePosition],
            PropertyName::AbsDomePosition => &[DomeAbsolutePosition],
            PropertyName::DomeAbortMotion => &[Abort],
            PropertyName::DomeShutter => &[ShutterOpen, ShutterClose],
            PropertyName::DomeGoto => &[DomeHome, DomePark],
            PropertyName::DomeParams => &[HomePosition, ParkPosition, AutosyncThreshold],
            PropertyName::DomeAutosync => &[DomeAutosyncEnable, DomeAutosyncDisable],
            PropertyName::Other(_) => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_name_round_trip() {
        let name = PropertyName::parse("EQUATORIAL_EOD_COORD");
        assert_eq!(name, PropertyName::EquatorialEodCoord);
        assert_eq!(name.as_str(), "EQUATORIAL_EOD_COORD");
        assert!(name.is_known());
    }

    #[test]
    fn test_unknown_property_name() {
        let name = PropertyName::parse("MY_CUSTOM_PROP");
        assert_eq!(name, PropertyName::Other("MY_CUSTOM_PROP".to_string()));
        assert_eq!(name.as_str(), "MY_CUSTOM_PROP");
        assert!(!name.is_known());
        assert!(name.known_values().is_none());
    }

    #[test]
    fn test_known_values_table() {
        let values = PropertyName::Connection.known_values().unwrap();
        assert!(values.contains(&ValueName::Connect));
        assert!(values.contains(&ValueName::Disconnect));
        assert!(!values.contains(&ValueName::Ra));

        let values = PropertyName::EquatorialEodCoord.known_values().unwrap();
        assert_eq!(values, &[ValueName::Ra, ValueName::Dec][..]);
    }

    #[test]
    fn test_case_sensitivity() {
        // Matching is case-sensitive; lowercase is a different identifier.
        assert!(!PropertyName::parse("connection").is_known());
    }
}
