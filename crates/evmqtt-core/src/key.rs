// evmqtt Key Naming
// Key identifiers from Linux input-event-codes.h and the KeyCodes sequence

use std::fmt;
use std::sync::OnceLock;

/// Ordered, non-empty sequence of key identifiers for one physical action.
///
/// Most codes carry a single identifier. Codes that the kernel header
/// defines under several names (e.g. `KEY_MUTE` / `KEY_MIN_INTERESTING`)
/// carry all of them, canonical name first. The first element is the
/// primary code used for modifier tracking and publish filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCodes(Vec<String>);

impl KeyCodes {
    /// Build from a list of identifiers. Returns `None` for an empty list.
    pub fn new<I, S>(codes: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        if codes.is_empty() {
            None
        } else {
            Some(Self(codes))
        }
    }

    /// A sequence of length one
    pub fn single(code: impl Into<String>) -> Self {
        Self(vec![code.into()])
    }

    /// The first reported identifier
    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for KeyCodes {
    fn from(code: &str) -> Self {
        Self::single(code)
    }
}

impl fmt::Display for KeyCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

/// Resolve a raw EV_KEY code to its identifiers.
///
/// Codes with no entry in the table resolve to `KEY_UNKNOWN_<code>`.
pub fn key_names(code: u16) -> KeyCodes {
    match key_name_table().get(code as usize) {
        Some(names) if !names.is_empty() => {
            KeyCodes(names.iter().map(|n| (*n).to_string()).collect())
        }
        _ => KeyCodes::single(format!("KEY_UNKNOWN_{}", code)),
    }
}

/// Canonical identifier for a key code, if known
pub fn key_name(code: u16) -> Option<&'static str> {
    key_name_table()
        .get(code as usize)
        .and_then(|names| names.first().copied())
}

fn key_name_table() -> &'static [&'static [&'static str]] {
    static KEY_NAMES: OnceLock<Vec<&'static [&'static str]>> = OnceLock::new();
    KEY_NAMES.get_or_init(|| {
        let unnamed: &'static [&'static str] = &[];
        let mut names = vec![unnamed; 0x300];
        names[0] = &["KEY_RESERVED"];
        names[1] = &["KEY_ESC"];
        names[2] = &["KEY_1"];
        names[3] = &["KEY_2"];
        names[4] = &["KEY_3"];
        names[5] = &["KEY_4"];
        names[6] = &["KEY_5"];
        names[7] = &["KEY_6"];
        names[8] = &["KEY_7"];
        names[9] = &["KEY_8"];
        names[10] = &["KEY_9"];
        names[11] = &["KEY_0"];
        names[12] = &["KEY_MINUS"];
        names[13] = &["KEY_EQUAL"];
        names[14] = &["KEY_BACKSPACE"];
        names[15] = &["KEY_TAB"];
        names[16] = &["KEY_Q"];
        names[17] = &["KEY_W"];
        names[18] = &["KEY_E"];
        names[19] = &["KEY_R"];
        names[20] = &["KEY_T"];
        names[21] = &["KEY_Y"];
        names[22] = &["KEY_U"];
        names[23] = &["KEY_I"];
        names[24] = &["KEY_O"];
        names[25] = &["KEY_P"];
        names[26] = &["KEY_LEFTBRACE"];
        names[27] = &["KEY_RIGHTBRACE"];
        names[28] = &["KEY_ENTER"];
        names[29] = &["KEY_LEFTCTRL"];
        names[30] = &["KEY_A"];
        names[31] = &["KEY_S"];
        names[32] = &["KEY_D"];
        names[33] = &["KEY_F"];
        names[34] = &["KEY_G"];
        names[35] = &["KEY_H"];
        names[36] = &["KEY_J"];
        names[37] = &["KEY_K"];
        names[38] = &["KEY_L"];
        names[39] = &["KEY_SEMICOLON"];
        names[40] = &["KEY_APOSTROPHE"];
        names[41] = &["KEY_GRAVE"];
        names[42] = &["KEY_LEFTSHIFT"];
        names[43] = &["KEY_BACKSLASH"];
        names[44] = &["KEY_Z"];
        names[45] = &["KEY_X"];
        names[46] = &["KEY_C"];
        names[47] = &["KEY_V"];
        names[48] = &["KEY_B"];
        names[49] = &["KEY_N"];
        names[50] = &["KEY_M"];
        names[51] = &["KEY_COMMA"];
        names[52] = &["KEY_DOT"];
        names[53] = &["KEY_SLASH"];
        names[54] = &["KEY_RIGHTSHIFT"];
        names[55] = &["KEY_KPASTERISK"];
        names[56] = &["KEY_LEFTALT"];
        names[57] = &["KEY_SPACE"];
        names[58] = &["KEY_CAPSLOCK"];
        names[59] = &["KEY_F1"];
        names[60] = &["KEY_F2"];
        names[61] = &["KEY_F3"];
        names[62] = &["KEY_F4"];
        names[63] = &["KEY_F5"];
        names[64] = &["KEY_F6"];
        names[65] = &["KEY_F7"];
        names[66] = &["KEY_F8"];
        names[67] = &["KEY_F9"];
        names[68] = &["KEY_F10"];
        names[69] = &["KEY_NUMLOCK"];
        names[70] = &["KEY_SCROLLLOCK"];
        names[71] = &["KEY_KP7"];
        names[72] = &["KEY_KP8"];
        names[73] = &["KEY_KP9"];
        names[74] = &["KEY_KPMINUS"];
        names[75] = &["KEY_KP4"];
        names[76] = &["KEY_KP5"];
        names[77] = &["KEY_KP6"];
        names[78] = &["KEY_KPPLUS"];
        names[79] = &["KEY_KP1"];
        names[80] = &["KEY_KP2"];
        names[81] = &["KEY_KP3"];
        names[82] = &["KEY_KP0"];
        names[83] = &["KEY_KPDOT"];
        names[85] = &["KEY_ZENKAKUHANKAKU"];
        names[86] = &["KEY_102ND"];
        names[87] = &["KEY_F11"];
        names[88] = &["KEY_F12"];
        names[89] = &["KEY_RO"];
        names[90] = &["KEY_KATAKANA"];
        names[91] = &["KEY_HIRAGANA"];
        names[92] = &["KEY_HENKAN"];
        names[93] = &["KEY_KATAKANAHIRAGANA"];
        names[94] = &["KEY_MUHENKAN"];
        names[95] = &["KEY_KPJPCOMMA"];
        names[96] = &["KEY_KPENTER"];
        names[97] = &["KEY_RIGHTCTRL"];
        names[98] = &["KEY_KPSLASH"];
        names[99] = &["KEY_SYSRQ"];
        names[100] = &["KEY_RIGHTALT"];
        names[101] = &["KEY_LINEFEED"];
        names[102] = &["KEY_HOME"];
        names[103] = &["KEY_UP"];
        names[104] = &["KEY_PAGEUP"];
        names[105] = &["KEY_LEFT"];
        names[106] = &["KEY_RIGHT"];
        names[107] = &["KEY_END"];
        names[108] = &["KEY_DOWN"];
        names[109] = &["KEY_PAGEDOWN"];
        names[110] = &["KEY_INSERT"];
        names[111] = &["KEY_DELETE"];
        names[112] = &["KEY_MACRO"];
        names[113] = &["KEY_MUTE", "KEY_MIN_INTERESTING"];
        names[114] = &["KEY_VOLUMEDOWN"];
        names[115] = &["KEY_VOLUMEUP"];
        names[116] = &["KEY_POWER"];
        names[117] = &["KEY_KPEQUAL"];
        names[118] = &["KEY_KPPLUSMINUS"];
        names[119] = &["KEY_PAUSE"];
        names[120] = &["KEY_SCALE"];
        names[121] = &["KEY_KPCOMMA"];
        names[122] = &["KEY_HANGEUL", "KEY_HANGUEL"];
        names[123] = &["KEY_HANJA"];
        names[124] = &["KEY_YEN"];
        names[125] = &["KEY_LEFTMETA"];
        names[126] = &["KEY_RIGHTMETA"];
        names[127] = &["KEY_COMPOSE"];
        names[128] = &["KEY_STOP"];
        names[129] = &["KEY_AGAIN"];
        names[130] = &["KEY_PROPS"];
        names[131] = &["KEY_UNDO"];
        names[132] = &["KEY_FRONT"];
        names[133] = &["KEY_COPY"];
        names[134] = &["KEY_OPEN"];
        names[135] = &["KEY_PASTE"];
        names[136] = &["KEY_FIND"];
        names[137] = &["KEY_CUT"];
        names[138] = &["KEY_HELP"];
        names[139] = &["KEY_MENU"];
        names[140] = &["KEY_CALC"];
        names[141] = &["KEY_SETUP"];
        names[142] = &["KEY_SLEEP"];
        names[143] = &["KEY_WAKEUP"];
        names[144] = &["KEY_FILE"];
        names[145] = &["KEY_SENDFILE"];
        names[146] = &["KEY_DELETEFILE"];
        names[147] = &["KEY_XFER"];
        names[148] = &["KEY_PROG1"];
        names[149] = &["KEY_PROG2"];
        names[150] = &["KEY_WWW"];
        names[151] = &["KEY_MSDOS"];
        names[152] = &["KEY_COFFEE", "KEY_SCREENLOCK"];
        names[153] = &["KEY_ROTATE_DISPLAY", "KEY_DIRECTION"];
        names[154] = &["KEY_CYCLEWINDOWS"];
        names[155] = &["KEY_MAIL"];
        names[156] = &["KEY_BOOKMARKS"];
        names[157] = &["KEY_COMPUTER"];
        names[158] = &["KEY_BACK"];
        names[159] = &["KEY_FORWARD"];
        names[160] = &["KEY_CLOSECD"];
        names[161] = &["KEY_EJECTCD"];
        names[162] = &["KEY_EJECTCLOSECD"];
        names[163] = &["KEY_NEXTSONG"];
        names[164] = &["KEY_PLAYPAUSE"];
        names[165] = &["KEY_PREVIOUSSONG"];
        names[166] = &["KEY_STOPCD"];
        names[167] = &["KEY_RECORD"];
        names[168] = &["KEY_REWIND"];
        names[169] = &["KEY_PHONE"];
        names[170] = &["KEY_ISO"];
        names[171] = &["KEY_CONFIG"];
        names[172] = &["KEY_HOMEPAGE"];
        names[173] = &["KEY_REFRESH"];
        names[174] = &["KEY_EXIT"];
        names[175] = &["KEY_MOVE"];
        names[176] = &["KEY_EDIT"];
        names[177] = &["KEY_SCROLLUP"];
        names[178] = &["KEY_SCROLLDOWN"];
        names[179] = &["KEY_KPLEFTPAREN"];
        names[180] = &["KEY_KPRIGHTPAREN"];
        names[181] = &["KEY_NEW"];
        names[182] = &["KEY_REDO"];
        names[183] = &["KEY_F13"];
        names[184] = &["KEY_F14"];
        names[185] = &["KEY_F15"];
        names[186] = &["KEY_F16"];
        names[187] = &["KEY_F17"];
        names[188] = &["KEY_F18"];
        names[189] = &["KEY_F19"];
        names[190] = &["KEY_F20"];
        names[191] = &["KEY_F21"];
        names[192] = &["KEY_F22"];
        names[193] = &["KEY_F23"];
        names[194] = &["KEY_F24"];
        names[200] = &["KEY_PLAYCD"];
        names[201] = &["KEY_PAUSECD"];
        names[202] = &["KEY_PROG3"];
        names[203] = &["KEY_PROG4"];
        names[204] = &["KEY_ALL_APPLICATIONS", "KEY_DASHBOARD"];
        names[205] = &["KEY_SUSPEND"];
        names[206] = &["KEY_CLOSE"];
        names[207] = &["KEY_PLAY"];
        names[208] = &["KEY_FASTFORWARD"];
        names[209] = &["KEY_BASSBOOST"];
        names[210] = &["KEY_PRINT"];
        names[211] = &["KEY_HP"];
        names[212] = &["KEY_CAMERA"];
        names[213] = &["KEY_SOUND"];
        names[214] = &["KEY_QUESTION"];
        names[215] = &["KEY_EMAIL"];
        names[216] = &["KEY_CHAT"];
        names[217] = &["KEY_SEARCH"];
        names[218] = &["KEY_CONNECT"];
        names[219] = &["KEY_FINANCE"];
        names[220] = &["KEY_SPORT"];
        names[221] = &["KEY_SHOP"];
        names[222] = &["KEY_ALTERASE"];
        names[223] = &["KEY_CANCEL"];
        names[224] = &["KEY_BRIGHTNESSDOWN"];
        names[225] = &["KEY_BRIGHTNESSUP"];
        names[226] = &["KEY_MEDIA"];
        names[227] = &["KEY_SWITCHVIDEOMODE"];
        names[228] = &["KEY_KBDILLUMTOGGLE"];
        names[229] = &["KEY_KBDILLUMDOWN"];
        names[230] = &["KEY_KBDILLUMUP"];
        names[231] = &["KEY_SEND"];
        names[232] = &["KEY_REPLY"];
        names[233] = &["KEY_FORWARDMAIL"];
        names[234] = &["KEY_SAVE"];
        names[235] = &["KEY_DOCUMENTS"];
        names[236] = &["KEY_BATTERY"];
        names[237] = &["KEY_BLUETOOTH"];
        names[238] = &["KEY_WLAN"];
        names[239] = &["KEY_UWB"];
        names[240] = &["KEY_UNKNOWN"];
        names[241] = &["KEY_VIDEO_NEXT"];
        names[242] = &["KEY_VIDEO_PREV"];
        names[243] = &["KEY_BRIGHTNESS_CYCLE"];
        names[244] = &["KEY_BRIGHTNESS_AUTO", "KEY_BRIGHTNESS_ZERO"];
        names[245] = &["KEY_DISPLAY_OFF"];
        names[246] = &["KEY_WWAN", "KEY_WIMAX"];
        names[247] = &["KEY_RFKILL"];
        names[248] = &["KEY_MICMUTE"];
        names[0x100] = &["BTN_0", "BTN_MISC"];
        names[0x101] = &["BTN_1"];
        names[0x102] = &["BTN_2"];
        names[0x103] = &["BTN_3"];
        names[0x104] = &["BTN_4"];
        names[0x105] = &["BTN_5"];
        names[0x106] = &["BTN_6"];
        names[0x107] = &["BTN_7"];
        names[0x108] = &["BTN_8"];
        names[0x109] = &["BTN_9"];
        names[0x110] = &["BTN_LEFT", "BTN_MOUSE"];
        names[0x111] = &["BTN_RIGHT"];
        names[0x112] = &["BTN_MIDDLE"];
        names[0x113] = &["BTN_SIDE"];
        names[0x114] = &["BTN_EXTRA"];
        names[0x115] = &["BTN_FORWARD"];
        names[0x116] = &["BTN_BACK"];
        names[0x117] = &["BTN_TASK"];
        names[0x120] = &["BTN_TRIGGER", "BTN_JOYSTICK"];
        names[0x121] = &["BTN_THUMB"];
        names[0x122] = &["BTN_THUMB2"];
        names[0x123] = &["BTN_TOP"];
        names[0x124] = &["BTN_TOP2"];
        names[0x125] = &["BTN_PINKIE"];
        names[0x126] = &["BTN_BASE"];
        names[0x127] = &["BTN_BASE2"];
        names[0x128] = &["BTN_BASE3"];
        names[0x129] = &["BTN_BASE4"];
        names[0x12a] = &["BTN_BASE5"];
        names[0x12b] = &["BTN_BASE6"];
        names[0x12f] = &["BTN_DEAD"];
        names[0x130] = &["BTN_SOUTH", "BTN_A", "BTN_GAMEPAD"];
        names[0x131] = &["BTN_EAST", "BTN_B"];
        names[0x132] = &["BTN_C"];
        names[0x133] = &["BTN_NORTH", "BTN_X"];
        names[0x134] = &["BTN_WEST", "BTN_Y"];
        names[0x135] = &["BTN_Z"];
        names[0x136] = &["BTN_TL"];
        names[0x137] = &["BTN_TR"];
        names[0x138] = &["BTN_TL2"];
        names[0x139] = &["BTN_TR2"];
        names[0x13a] = &["BTN_SELECT"];
        names[0x13b] = &["BTN_START"];
        names[0x13c] = &["BTN_MODE"];
        names[0x13d] = &["BTN_THUMBL"];
        names[0x13e] = &["BTN_THUMBR"];
        names[0x140] = &["BTN_TOOL_PEN", "BTN_DIGI"];
        names[0x141] = &["BTN_TOOL_RUBBER"];
        names[0x142] = &["BTN_TOOL_BRUSH"];
        names[0x143] = &["BTN_TOOL_PENCIL"];
        names[0x144] = &["BTN_TOOL_AIRBRUSH"];
        names[0x145] = &["BTN_TOOL_FINGER"];
        names[0x146] = &["BTN_TOOL_MOUSE"];
        names[0x147] = &["BTN_TOOL_LENS"];
        names[0x148] = &["BTN_TOOL_QUINTTAP"];
        names[0x149] = &["BTN_STYLUS3"];
        names[0x14a] = &["BTN_TOUCH"];
        names[0x14b] = &["BTN_STYLUS"];
        names[0x14c] = &["BTN_STYLUS2"];
        names[0x14d] = &["BTN_TOOL_DOUBLETAP"];
        names[0x14e] = &["BTN_TOOL_TRIPLETAP"];
        names[0x14f] = &["BTN_TOOL_QUADTAP"];
        names[0x150] = &["BTN_GEAR_DOWN", "BTN_WHEEL"];
        names[0x151] = &["BTN_GEAR_UP"];
        names[0x160] = &["KEY_OK"];
        names[0x161] = &["KEY_SELECT"];
        names[0x162] = &["KEY_GOTO"];
        names[0x163] = &["KEY_CLEAR"];
        names[0x164] = &["KEY_POWER2"];
        names[0x165] = &["KEY_OPTION"];
        names[0x166] = &["KEY_INFO"];
        names[0x167] = &["KEY_TIME"];
        names[0x168] = &["KEY_VENDOR"];
        names[0x169] = &["KEY_ARCHIVE"];
        names[0x16a] = &["KEY_PROGRAM"];
        names[0x16b] = &["KEY_CHANNEL"];
        names[0x16c] = &["KEY_FAVORITES"];
        names[0x16d] = &["KEY_EPG"];
        names[0x16e] = &["KEY_PVR"];
        names[0x16f] = &["KEY_MHP"];
        names[0x170] = &["KEY_LANGUAGE"];
        names[0x171] = &["KEY_TITLE"];
        names[0x172] = &["KEY_SUBTITLE"];
        names[0x173] = &["KEY_ANGLE"];
        names[0x174] = &["KEY_FULL_SCREEN", "KEY_ZOOM"];
        names[0x175] = &["KEY_MODE"];
        names[0x176] = &["KEY_KEYBOARD"];
        names[0x177] = &["KEY_ASPECT_RATIO", "KEY_SCREEN"];
        names[0x178] = &["KEY_PC"];
        names[0x179] = &["KEY_TV"];
        names[0x17a] = &["KEY_TV2"];
        names[0x17b] = &["KEY_VCR"];
        names[0x17c] = &["KEY_VCR2"];
        names[0x17d] = &["KEY_SAT"];
        names[0x17e] = &["KEY_SAT2"];
        names[0x17f] = &["KEY_CD"];
        names[0x180] = &["KEY_TAPE"];
        names[0x181] = &["KEY_RADIO"];
        names[0x182] = &["KEY_TUNER"];
        names[0x183] = &["KEY_PLAYER"];
        names[0x184] = &["KEY_TEXT"];
        names[0x185] = &["KEY_DVD"];
        names[0x186] = &["KEY_AUX"];
        names[0x187] = &["KEY_MP3"];
        names[0x188] = &["KEY_AUDIO"];
        names[0x189] = &["KEY_VIDEO"];
        names[0x18a] = &["KEY_DIRECTORY"];
        names[0x18b] = &["KEY_LIST"];
        names[0x18c] = &["KEY_MEMO"];
        names[0x18d] = &["KEY_CALENDAR"];
        names[0x18e] = &["KEY_RED"];
        names[0x18f] = &["KEY_GREEN"];
        names[0x190] = &["KEY_YELLOW"];
        names[0x191] = &["KEY_BLUE"];
        names[0x192] = &["KEY_CHANNELUP"];
        names[0x193] = &["KEY_CHANNELDOWN"];
        names[0x194] = &["KEY_FIRST"];
        names[0x195] = &["KEY_LAST"];
        names[0x196] = &["KEY_AB"];
        names[0x197] = &["KEY_NEXT"];
        names[0x198] = &["KEY_RESTART"];
        names[0x199] = &["KEY_SLOW"];
        names[0x19a] = &["KEY_SHUFFLE"];
        names[0x19b] = &["KEY_BREAK"];
        names[0x19c] = &["KEY_PREVIOUS"];
        names[0x19d] = &["KEY_DIGITS"];
        names[0x19e] = &["KEY_TEEN"];
        names[0x19f] = &["KEY_TWEN"];
        names[0x1a0] = &["KEY_VIDEOPHONE"];
        names[0x1a1] = &["KEY_GAMES"];
        names[0x1a2] = &["KEY_ZOOMIN"];
        names[0x1a3] = &["KEY_ZOOMOUT"];
        names[0x1a4] = &["KEY_ZOOMRESET"];
        names[0x1a5] = &["KEY_WORDPROCESSOR"];
        names[0x1a6] = &["KEY_EDITOR"];
        names[0x1a7] = &["KEY_SPREADSHEET"];
        names[0x1a8] = &["KEY_GRAPHICSEDITOR"];
        names[0x1a9] = &["KEY_PRESENTATION"];
        names[0x1aa] = &["KEY_DATABASE"];
        names[0x1ab] = &["KEY_NEWS"];
        names[0x1ac] = &["KEY_VOICEMAIL"];
        names[0x1ad] = &["KEY_ADDRESSBOOK"];
        names[0x1ae] = &["KEY_MESSENGER"];
        names[0x1af] = &["KEY_DISPLAYTOGGLE", "KEY_BRIGHTNESS_TOGGLE"];
        names[0x1b0] = &["KEY_SPELLCHECK"];
        names[0x1b1] = &["KEY_LOGOFF"];
        names[0x1b2] = &["KEY_DOLLAR"];
        names[0x1b3] = &["KEY_EURO"];
        names[0x1b4] = &["KEY_FRAMEBACK"];
        names[0x1b5] = &["KEY_FRAMEFORWARD"];
        names[0x1b6] = &["KEY_CONTEXT_MENU"];
        names[0x1b7] = &["KEY_MEDIA_REPEAT"];
        names[0x1b8] = &["KEY_10CHANNELSUP"];
        names[0x1b9] = &["KEY_10CHANNELSDOWN"];
        names[0x1ba] = &["KEY_IMAGES"];
        names[0x1d0] = &["KEY_FN"];
        names[0x200] = &["KEY_NUMERIC_0"];
        names[0x201] = &["KEY_NUMERIC_1"];
        names[0x202] = &["KEY_NUMERIC_2"];
        names[0x203] = &["KEY_NUMERIC_3"];
        names[0x204] = &["KEY_NUMERIC_4"];
        names[0x205] = &["KEY_NUMERIC_5"];
        names[0x206] = &["KEY_NUMERIC_6"];
        names[0x207] = &["KEY_NUMERIC_7"];
        names[0x208] = &["KEY_NUMERIC_8"];
        names[0x209] = &["KEY_NUMERIC_9"];
        names[0x20a] = &["KEY_NUMERIC_STAR"];
        names[0x20b] = &["KEY_NUMERIC_POUND"];
        names
    })
}
