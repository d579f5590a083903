//! Static table of known commands
//!
//! Enumerations and descriptors are plain statics. [all] lists them sorted by
//! `(code, subcode)` and [find] / [by_code] look them up.

#![allow(missing_docs)]

use crate::{
    command::{Code, Command},
    fields::{EnumDef, Field},
};

/// Display power
pub static POWER_STATE: EnumDef = EnumDef {
    name: "POWER_STATE",
    members: &[("OFF", 0x00), ("ON", 0x01), ("REBOOT", 0x02)]
};

pub static MUTE_STATE: EnumDef = EnumDef {
    name: "MUTE_STATE",
    members: &[("OFF", 0x00), ("ON", 0x01)]
};

pub static INPUT_SOURCE_STATE: EnumDef = EnumDef {
    name: "INPUT_SOURCE_STATE",
    members: &[
        ("S_VIDEO", 0x04),
        ("COMPONENT", 0x08),
        ("AV", 0x0C),
        ("AV2", 0x0D),
        ("SCART1", 0x0E),
        ("DVI", 0x18),
        ("PC", 0x14),
        ("BNC", 0x1E),
        ("DVI_VIDEO", 0x1F),
        ("MAGIC_INFO", 0x20),
        ("HDMI1", 0x21),
        ("HDMI1_PC", 0x22),
        ("HDMI2", 0x23),
        ("HDMI2_PC", 0x24),
        ("DISPLAY_PORT_1", 0x25),
        ("DISPLAY_PORT_2", 0x26),
        ("DISPLAY_PORT_3", 0x27),
        ("RF_TV", 0x30),
        ("HDMI3", 0x31),
        ("HDMI3_PC", 0x32),
        ("HDMI4", 0x33),
        ("HDMI4_PC", 0x34),
        ("TV_DTV", 0x40),
        ("PLUG_IN_MODE", 0x50),
        ("HD_BASE_T", 0x55),
        ("MEDIA_MAGIC_INFO_S", 0x60),
        ("WIDI_SCREEN_MIRRORING", 0x61),
        ("INTERNAL_USB", 0x62),
        ("URL_LAUNCHER", 0x63),
        ("IWB", 0x64)
    ]
};

pub static ASPECT_STATE: EnumDef = EnumDef {
    name: "ASPECT_STATE",
    members: &[
        ("PC_16_9", 0x10),
        ("PC_4_3", 0x18),
        ("PC_ORIGINAL_RATIO", 0x20),
        ("PC_21_9", 0x21),
        ("VIDEO_AUTO_WIDE", 0x00),
        ("VIDEO_16_9", 0x01),
        ("VIDEO_ZOOM", 0x04),
        ("VIDEO_ZOOM_1", 0x05),
        ("VIDEO_ZOOM_2", 0x06),
        ("VIDEO_SCREEN_FIT", 0x09),
        ("VIDEO_4_3", 0x0B),
        ("VIDEO_WIDE_FIT", 0x0C),
        ("VIDEO_CUSTOM", 0x0D),
        ("VIDEO_SMART_VIEW_1", 0x0E),
        ("VIDEO_SMART_VIEW_2", 0x0F),
        ("VIDEO_WIDE_ZOOM", 0x31),
        ("VIDEO_21_9", 0x32)
    ]
};

pub static MODEL_SPECIES: EnumDef = EnumDef {
    name: "MODEL_SPECIES",
    members: &[("PDP", 0x01), ("LCD", 0x02), ("DLP", 0x03), ("LED", 0x04), ("CRT", 0x05), ("OLED", 0x06)]
};

pub static TV_SUPPORT: EnumDef = EnumDef {
    name: "TV_SUPPORT",
    members: &[("SUPPORTED", 0x00), ("NOT_SUPPORTED", 0x01)]
};

pub static MDC_CONNECTION_TYPE: EnumDef = EnumDef {
    name: "MDC_CONNECTION_TYPE",
    members: &[("RS232C", 0x00), ("RJ45", 0x01)]
};

pub static RESET_TARGET: EnumDef = EnumDef {
    name: "RESET_TARGET",
    members: &[("PICTURE", 0x00), ("SOUND", 0x01), ("SETUP", 0x02), ("ALL", 0x03), ("SCREEN_DISPLAY", 0x04)]
};

/// Keys accepted by the virtual remote.
///
/// On some models `KEY_CONTENT` acts as Home and `KEY_DISPLAY` as Info.
pub static REMOTE_KEY_CODE: EnumDef = EnumDef {
    name: "REMOTE_KEY_CODE",
    members: &[
        ("KEY_SOURCE", 0x01),
        ("KEY_POWER", 0x02),
        ("KEY_1", 0x04),
        ("KEY_2", 0x05),
        ("KEY_3", 0x06),
        ("KEY_VOLUME_UP", 0x07),
        ("KEY_4", 0x08),
        ("KEY_5", 0x09),
        ("KEY_6", 0x0A),
        ("KEY_VOLUME_DOWN", 0x0B),
        ("KEY_7", 0x0C),
        ("KEY_8", 0x0D),
        ("KEY_9", 0x0E),
        ("KEY_MUTE", 0x0F),
        ("KEY_CHANNEL_DOWN", 0x10),
        ("KEY_0", 0x11),
        ("KEY_CHANNEL_UP", 0x12),
        ("KEY_GREEN", 0x14),
        ("KEY_YELLOW", 0x15),
        ("KEY_CYAN", 0x16),
        ("KEY_MENU", 0x1A),
        ("KEY_DISPLAY", 0x1F),
        ("KEY_DIGIT", 0x23),
        ("KEY_PIP_TV_VIDEO", 0x24),
        ("KEY_EXIT", 0x2D),
        ("KEY_REW", 0x45),
        ("KEY_STOP", 0x46),
        ("KEY_PLAY", 0x47),
        ("KEY_FF", 0x48),
        ("KEY_PAUSE", 0x4A),
        ("KEY_TOOLS", 0x4B),
        ("KEY_RETURN", 0x58),
        ("KEY_MAGICINFO_LITE", 0x5B),
        ("KEY_CURSOR_UP", 0x60),
        ("KEY_CURSOR_DOWN", 0x61),
        ("KEY_CURSOR_RIGHT", 0x62),
        ("KEY_CURSOR_LEFT", 0x65),
        ("KEY_ENTER", 0x68),
        ("KEY_RED", 0x6C),
        ("KEY_LOCK", 0x77),
        ("KEY_CONTENT", 0x79),
        ("DISCRET_POWER_OFF", 0x98),
        ("KEY_3D", 0x9F)
    ]
};

pub static NETWORK_STANDBY_STATE: EnumDef = EnumDef {
    name: "NETWORK_STANDBY_STATE",
    members: &[("OFF", 0x00), ("ON", 0x01)]
};

pub static AUTO_ID_SETTING_STATE: EnumDef = EnumDef {
    name: "AUTO_ID_SETTING_STATE",
    members: &[("START", 0x00), ("END", 0x01)]
};

pub static DISPLAY_ID_STATE: EnumDef = EnumDef {
    name: "DISPLAY_ID_STATE",
    members: &[("OFF", 0x00), ("ON", 0x01)]
};

pub static PLAY_VIA_MODE: EnumDef = EnumDef {
    name: "PLAY_VIA_MODE",
    members: &[("MAGIC_INFO", 0x00), ("URL_LAUNCHER", 0x01), ("MAGIC_IWB", 0x02)]
};

pub static TIMER_REPEAT: EnumDef = EnumDef {
    name: "TIMER_REPEAT",
    members: &[
        ("ONCE", 0x00),
        ("EVERYDAY", 0x01),
        ("MON_FRI", 0x02),
        ("MON_SAT", 0x03),
        ("SAT_SUN", 0x04),
        ("MANUAL", 0x05)
    ]
};

/// Bit positions of the manual weekday mask
pub static TIMER_WEEKDAY: EnumDef = EnumDef {
    name: "TIMER_WEEKDAY",
    members: &[("SUN", 0), ("MON", 1), ("TUE", 2), ("WED", 3), ("THU", 4), ("FRI", 5), ("SAT", 6)]
};

pub static TIMER_HOLIDAY: EnumDef = EnumDef {
    name: "TIMER_HOLIDAY",
    members: &[("DONT_APPLY_BOTH", 0x00), ("APPLY_BOTH", 0x01), ("ON_TIMER_ONLY_APPLY", 0x02), ("OFF_TIMER_ONLY_APPLY", 0x03)]
};

pub static STATUS: Command = Command {
    name: "status",
    code: Code::Fixed(0x00),
    get: true,
    fields: &[
        Field::enumeration(&POWER_STATE),
        Field::int("VOLUME"),
        Field::enumeration(&MUTE_STATE),
        Field::enumeration(&INPUT_SOURCE_STATE),
        Field::enumeration(&ASPECT_STATE),
        Field::int("N_TIME_NF"),
        Field::int("F_TIME_NF")
    ],
    doc: "Power, volume, mute, input and picture size at once",
    ..Command::BASE
};

pub static SERIAL_NUMBER: Command = Command {
    name: "serial_number",
    code: Code::Fixed(0x0B),
    get: true,
    fields: &[Field::string("SERIAL_NUM")],
    ..Command::BASE
};

pub static MODEL_NUMBER: Command = Command {
    name: "model_number",
    code: Code::Fixed(0x10),
    get: true,
    fields: &[
        Field::enumeration(&MODEL_SPECIES),
        Field::int("MODEL_NUMBER"),
        Field::enumeration(&TV_SUPPORT)
    ],
    ..Command::BASE
};

pub static POWER: Command = Command {
    name: "power",
    code: Code::Fixed(0x11),
    get: true,
    set: true,
    fields: &[Field::enumeration(&POWER_STATE)],
    ..Command::BASE
};

pub static VOLUME: Command = Command {
    name: "volume",
    code: Code::Fixed(0x12),
    get: true,
    set: true,
    fields: &[Field::int_range("VOLUME", 0, 100)],
    ..Command::BASE
};

pub static MUTE: Command = Command {
    name: "mute",
    code: Code::Fixed(0x13),
    get: true,
    set: true,
    fields: &[Field::enumeration(&MUTE_STATE)],
    ..Command::BASE
};

pub static INPUT_SOURCE: Command = Command {
    name: "input_source",
    code: Code::Fixed(0x14),
    get: true,
    set: true,
    fields: &[Field::enumeration(&INPUT_SOURCE_STATE)],
    ..Command::BASE
};

pub static PICTURE_SIZE: Command = Command {
    name: "picture_size",
    code: Code::Fixed(0x15),
    get: true,
    set: true,
    fields: &[Field::enumeration(&ASPECT_STATE)],
    ..Command::BASE
};

pub static NETWORK_CONFIGURE: Command = Command {
    name: "network_configure",
    code: Code::Fixed(0x1B),
    subcode: Some(0x82),
    get: true,
    set: true,
    fields: &[
        Field::ip("IP_ADDRESS"),
        Field::ip("SUBNET_MASK"),
        Field::ip("GATEWAY_ADDRESS"),
        Field::ip("DNS_SERVER_ADDRESS")
    ],
    ..Command::BASE
};

pub static NETWORK_AP_CONFIG: Command = Command {
    name: "network_ap_config",
    code: Code::Fixed(0x1B),
    subcode: Some(0x8B),
    set: true,
    fields: &[Field::coded_string("SSID", 0x00), Field::coded_string("PASSWORD", 0x01)],
    doc: "Join a wireless access point",
    ..Command::BASE
};

/// Readonly over RJ45
pub static MDC_CONNECTION: Command = Command {
    name: "mdc_connection",
    code: Code::Fixed(0x1D),
    get: true,
    fields: &[Field::enumeration(&MDC_CONNECTION_TYPE)],
    ..Command::BASE
};

pub static DEVICE_NAME: Command = Command {
    name: "device_name",
    code: Code::Fixed(0x67),
    get: true,
    fields: &[Field::string("DEVICE_NAME")],
    doc: "Device name set up in network settings",
    ..Command::BASE
};

/// Minutes of panel usage. Newer firmware answers with 2 or 3 bytes.
pub static PANEL_ON_TIME: Command = Command {
    name: "panel_on_time",
    code: Code::Fixed(0x83),
    get: true,
    fields: &[Field::int_remainder("MIN")],
    ..Command::BASE
};

pub static VIDEO_WALL_MODEL: Command = Command {
    name: "video_wall_model",
    code: Code::Fixed(0x89),
    get: true,
    set: true,
    fields: &[Field::video_wall("MODEL"), Field::int_range("SERIAL", 1, 255)],
    ..Command::BASE
};

pub static MODEL_NAME: Command = Command {
    name: "model_name",
    code: Code::Fixed(0x8A),
    get: true,
    fields: &[Field::string("MODEL_NAME")],
    ..Command::BASE
};

pub static RESET: Command = Command {
    name: "reset",
    code: Code::Fixed(0x9F),
    set: true,
    fields: &[Field::enumeration(&RESET_TARGET)],
    ..Command::BASE
};

/// Timers 1-3 sit at 0xA4-0xA6, timers 4-7 after the clock at 0xAB-0xAE
fn timer_code(index: u8) -> u8 {
    match index {
        1..=3 => 0xA3 + index,
        _ => 0xA7 + index
    }
}

const TIMER_ID: Field = Field::int_range("TIMER_ID", 1, 7);

/// Timer on firmware answering with 13 bytes: one repeat setting for both times
pub static TIMER_13: Command = Command {
    name: "timer_13",
    code: Code::Indexed { index: TIMER_ID, resolve: timer_code },
    get: true,
    set: true,
    fields: &[
        Field::time12h("ON_TIME"),
        Field::boolean("ON_ENABLED"),
        Field::time12h("OFF_TIME"),
        Field::boolean("OFF_ENABLED"),
        Field::named_enum("REPEAT", &TIMER_REPEAT),
        Field::bitmask("MANUAL_WEEKDAY", &TIMER_WEEKDAY),
        Field::int_range("VOLUME", 0, 100),
        Field::named_enum("INPUT_SOURCE", &INPUT_SOURCE_STATE),
        Field::named_enum("HOLIDAY_APPLY", &TIMER_HOLIDAY)
    ],
    other_revision: Some((15, "timer_15")),
    ..Command::BASE
};

/// Timer on firmware answering with 15 bytes: separate on and off repeat settings
pub static TIMER_15: Command = Command {
    name: "timer_15",
    code: Code::Indexed { index: TIMER_ID, resolve: timer_code },
    get: true,
    set: true,
    fields: &[
        Field::time12h("ON_TIME"),
        Field::boolean("ON_ENABLED"),
        Field::time12h("OFF_TIME"),
        Field::boolean("OFF_ENABLED"),
        Field::named_enum("ON_REPEAT", &TIMER_REPEAT),
        Field::bitmask("ON_MANUAL_WEEKDAY", &TIMER_WEEKDAY),
        Field::named_enum("OFF_REPEAT", &TIMER_REPEAT),
        Field::bitmask("OFF_MANUAL_WEEKDAY", &TIMER_WEEKDAY),
        Field::int_range("VOLUME", 0, 100),
        Field::named_enum("INPUT_SOURCE", &INPUT_SOURCE_STATE),
        Field::named_enum("HOLIDAY_APPLY", &TIMER_HOLIDAY)
    ],
    other_revision: Some((13, "timer_13")),
    ..Command::BASE
};

pub static CLOCK: Command = Command {
    name: "clock",
    code: Code::Fixed(0xA7),
    get: true,
    set: true,
    fields: &[Field::datetime("DATETIME", false)],
    ..Command::BASE
};

pub static VIRTUAL_REMOTE: Command = Command {
    name: "virtual_remote",
    code: Code::Fixed(0xB0),
    set: true,
    fields: &[Field::named_enum("KEY_CODE", &REMOTE_KEY_CODE)],
    doc: "Press a remote control key",
    ..Command::BASE
};

pub static NETWORK_STANDBY: Command = Command {
    name: "network_standby",
    code: Code::Fixed(0xB5),
    get: true,
    set: true,
    fields: &[Field::enumeration(&NETWORK_STANDBY_STATE)],
    ..Command::BASE
};

pub static AUTO_ID_SETTING: Command = Command {
    name: "auto_id_setting",
    code: Code::Fixed(0xB8),
    get: true,
    set: true,
    fields: &[Field::enumeration(&AUTO_ID_SETTING_STATE)],
    ..Command::BASE
};

pub static DISPLAY_ID: Command = Command {
    name: "display_id",
    code: Code::Fixed(0xB9),
    set: true,
    fields: &[Field::enumeration(&DISPLAY_ID_STATE)],
    doc: "Show or hide the display id on screen",
    ..Command::BASE
};

pub static LAUNCHER_PLAY_VIA: Command = Command {
    name: "launcher_play_via",
    code: Code::Fixed(0xC7),
    subcode: Some(0x81),
    get: true,
    set: true,
    fields: &[Field::enumeration(&PLAY_VIA_MODE)],
    ..Command::BASE
};

pub static LAUNCHER_URL_ADDRESS: Command = Command {
    name: "launcher_url_address",
    code: Code::Fixed(0xC7),
    subcode: Some(0x82),
    get: true,
    set: true,
    fields: &[Field::string("URL_ADDRESS")],
    ..Command::BASE
};

static COMMANDS: &[&Command] = &[
    &STATUS,
    &SERIAL_NUMBER,
    &MODEL_NUMBER,
    &POWER,
    &VOLUME,
    &MUTE,
    &INPUT_SOURCE,
    &PICTURE_SIZE,
    &NETWORK_CONFIGURE,
    &NETWORK_AP_CONFIG,
    &MDC_CONNECTION,
    &DEVICE_NAME,
    &PANEL_ON_TIME,
    &VIDEO_WALL_MODEL,
    &MODEL_NAME,
    &RESET,
    &TIMER_13,
    &TIMER_15,
    &CLOCK,
    &VIRTUAL_REMOTE,
    &NETWORK_STANDBY,
    &AUTO_ID_SETTING,
    &DISPLAY_ID,
    &LAUNCHER_PLAY_VIA,
    &LAUNCHER_URL_ADDRESS,
];

/// Every known command, sorted by `(code, subcode)`
pub fn all() -> Vec<&'static Command> {
    let mut commands = COMMANDS.to_vec();
    commands.sort_by_key(|command| (command.order(), command.name));
    commands
}

/// Find a command by name, ignoring case
pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().copied().find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Commands answering to a wire code and subcode.
///
/// Timer revisions share their codes, so several commands may match.
pub fn by_code(code: u8, subcode: Option<u8>) -> Vec<&'static Command> {
    all().into_iter()
        .filter(|command| command.subcode == subcode)
        .filter(|command| match command.code {
            Code::Fixed(fixed) => fixed == code,
            Code::Indexed { resolve, .. } => (1..=7).any(|index| resolve(index) == code)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fields::{FieldKind, ParseMode, Value};

    #[test]
    pub fn should_sort_by_code(){
        let commands = all();
        assert_eq!(commands.len(), COMMANDS.len());
        assert_eq!(commands[0].name, "status");
        assert!(commands.windows(2).all(|pair| pair[0].order() <= pair[1].order()));
        let launcher: Vec<_> = commands.iter().rev().take(2).map(|c| c.name).collect();
        assert_eq!(launcher, ["launcher_url_address", "launcher_play_via"]);
    }

    #[test]
    pub fn should_have_unique_names(){
        let mut names: Vec<_> = COMMANDS.iter().map(|c| c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), COMMANDS.len());
    }

    #[test]
    pub fn should_find_by_name(){
        assert_eq!(find("POWER").map(|c| c.name), Some("power"));
        assert_eq!(find("Timer_15").map(|c| c.name), Some("timer_15"));
        assert!(find("unknown").is_none());
    }

    #[test]
    pub fn should_find_by_code(){
        let names = |code, subcode| by_code(code, subcode).iter().map(|c| c.name).collect::<Vec<_>>();
        assert_eq!(names(0x11, None), ["power"]);
        assert_eq!(names(0xC7, Some(0x82)), ["launcher_url_address"]);
        assert_eq!(names(0xA6, None), ["timer_13", "timer_15"]);
        assert_eq!(names(0xAB, None), ["timer_13", "timer_15"]);
        assert_eq!(names(0xA7, None), ["clock"]);
        assert!(names(0xC7, None).is_empty());
    }

    #[test]
    pub fn should_not_share_codes_with_timers(){
        for command in COMMANDS {
            let Code::Fixed(code) = command.code else { continue };
            if command.subcode.is_none() {
                assert!((1..=7).all(|index| timer_code(index) != code), "{}", command.name);
            }
        }
    }

    #[test]
    pub fn should_keep_open_ended_fields_last(){
        for command in COMMANDS {
            let fields = command.response_fields();
            for field in fields.iter().take(fields.len().saturating_sub(1)) {
                assert!(!field.is_open_ended(), "{}: {}", command.name, field.name);
            }
        }
    }

    #[test]
    pub fn should_declare_consistent_timer_revisions(){
        let length = |command: &Command| command.fields.iter()
            .map(|field| match field.kind {
                FieldKind::Time12H => 3,
                _ => 1
            })
            .sum::<usize>();
        assert_eq!(length(&TIMER_13), 13);
        assert_eq!(length(&TIMER_15), 15);
        assert_eq!(TIMER_13.other_revision, Some((15, "timer_15")));
    }

    #[test]
    pub fn should_parse_status(){
        let values = STATUS.parse(&[1, 30, 0, 0x21, 0x10, 0, 0], ParseMode::Strict).unwrap();
        let rendered: Vec<_> = values.iter().map(Value::to_string).collect();
        assert_eq!(rendered, [
            "<POWER_STATE.ON:1>",
            "30",
            "<MUTE_STATE.OFF:0>",
            "<INPUT_SOURCE_STATE.HDMI1:33>",
            "<ASPECT_STATE.PC_16_9:16>",
            "0",
            "0"
        ]);
    }
}
