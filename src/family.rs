/// First year the family competed in the league; season enumeration starts here.
pub const START_YEAR: i32 = 2021;

#[derive(Debug, Clone, Copy)]
pub struct ClanInfo {
    pub name: &'static str,
    pub tag: &'static str,
}

/// The tracked clans, in processing order. This is configuration, not derived
/// data; adding a clan here is the only change needed to track it.
pub const FAMILY_CLANS: &[ClanInfo] = &[
    ClanInfo { name: "Reddit Zulu", tag: "#P0LYJC8C" },
    ClanInfo { name: "Reddit Tango", tag: "#2PP0QRJJG" },
    ClanInfo { name: "Reddit Oscar", tag: "#2Y28CGP8" },
    ClanInfo { name: "Reddit Kilo", tag: "#9UUVQJ0L" },
    ClanInfo { name: "Reddit Foxtrot", tag: "#2YGUPUQLP" },
];
