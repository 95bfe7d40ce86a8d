//! Campaign content validation.
//!
//! Authoring mistakes in a campaign bundle (an exit to a room that doesn't
//! exist, an enemy placed nowhere) would otherwise only surface mid-game.
//! [`validate_campaign`] checks the whole bundle in one pass and reports
//! every problem it finds as data; it never fails.

use crate::campaign::CampaignData;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// What kind of authoring problem a [`Violation`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// An exit targets a room id that doesn't exist.
    ExitTargetMissing,
    /// The starting room id doesn't exist.
    StartingRoomMissing,
    /// An enemy is placed in a room id that doesn't exist.
    EnemyRoomMissing,
    /// A treasure is placed in a room id that doesn't exist.
    TreasureRoomMissing,
    /// A locked exit's key id doesn't match any treasure.
    KeyMissing,
    /// A treasure's `requires` id doesn't match any treasure.
    RequirementMissing,
    /// A room cannot be reached from the starting room at all.
    RoomUnreachable,
    /// A room is only reachable through locked or hidden exits.
    RoomGated,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::ExitTargetMissing => "exit target missing",
            ViolationKind::StartingRoomMissing => "starting room missing",
            ViolationKind::EnemyRoomMissing => "enemy room missing",
            ViolationKind::TreasureRoomMissing => "treasure room missing",
            ViolationKind::KeyMissing => "key missing",
            ViolationKind::RequirementMissing => "requirement missing",
            ViolationKind::RoomUnreachable => "room unreachable",
            ViolationKind::RoomGated => "room gated",
        };
        f.write_str(s)
    }
}

/// One problem found in a campaign bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The kind of problem.
    pub kind: ViolationKind,

    /// Id of the entity carrying the bad reference (room, enemy, treasure,
    /// or "room:direction" for exits).
    pub offender: String,

    /// The id that failed to resolve, or the gated/unreachable room.
    pub referenced: String,
}

impl Violation {
    fn new(kind: ViolationKind, offender: impl Into<String>, referenced: impl Into<String>) -> Self {
        Self {
            kind,
            offender: offender.into(),
            referenced: referenced.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.kind, self.offender, self.referenced)
    }
}

/// The result of validating a campaign bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Every violation found, in bundle order.
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// True when no violations were found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations that block play (everything except reachability warnings).
    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| {
            !matches!(
                v.kind,
                ViolationKind::RoomUnreachable | ViolationKind::RoomGated
            )
        })
    }

    /// Reachability warnings (gated or unreachable rooms).
    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| {
            matches!(
                v.kind,
                ViolationKind::RoomUnreachable | ViolationKind::RoomGated
            )
        })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return f.write_str("campaign is valid");
        }
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Check every cross-reference in a campaign bundle.
///
/// Collects all violations in a single pass instead of stopping at the
/// first. An empty report means the bundle is valid.
pub fn validate_campaign(data: &CampaignData) -> ValidationReport {
    let mut violations = Vec::new();

    if !data.rooms.contains_key(&data.starting_room) {
        violations.push(Violation::new(
            ViolationKind::StartingRoomMissing,
            &data.name,
            &data.starting_room,
        ));
    }

    for (room_id, room) in &data.rooms {
        for (direction, exit) in &room.exits {
            let offender = format!("{room_id}:{direction}");
            if !data.rooms.contains_key(&exit.target_room_id) {
                violations.push(Violation::new(
                    ViolationKind::ExitTargetMissing,
                    offender.clone(),
                    &exit.target_room_id,
                ));
            }
            if let Some(key_id) = &exit.key_id {
                if !data.initial_treasure.contains_key(key_id) {
                    violations.push(Violation::new(
                        ViolationKind::KeyMissing,
                        offender,
                        key_id,
                    ));
                }
            }
        }
    }

    for (enemy_id, enemy) in &data.initial_enemies {
        if let Some(room_id) = &enemy.room_id {
            if !data.rooms.contains_key(room_id) {
                violations.push(Violation::new(
                    ViolationKind::EnemyRoomMissing,
                    enemy_id,
                    room_id,
                ));
            }
        }
    }

    for (treasure_id, treasure) in &data.initial_treasure {
        if !data.rooms.contains_key(&treasure.room_id) {
            violations.push(Violation::new(
                ViolationKind::TreasureRoomMissing,
                treasure_id,
                &treasure.room_id,
            ));
        }
        if let Some(requires) = &treasure.requires {
            if !data.initial_treasure.contains_key(requires) {
                violations.push(Violation::new(
                    ViolationKind::RequirementMissing,
                    treasure_id,
                    requires,
                ));
            }
        }
    }

    check_reachability(data, &mut violations);

    ValidationReport { violations }
}

/// Flood-fill the room graph from the starting room.
///
/// The first pass follows only open exits (neither locked nor hidden); rooms
/// missed by it but reached when gated exits are allowed are reported as
/// gated, the rest as unreachable.
fn check_reachability(data: &CampaignData, violations: &mut Vec<Violation>) {
    if !data.rooms.contains_key(&data.starting_room) {
        return;
    }

    let open = flood(data, |exit| !exit.locked && !exit.hidden);
    let any = flood(data, |_| true);

    for room_id in data.rooms.keys() {
        if open.contains(room_id) {
            continue;
        }
        let kind = if any.contains(room_id) {
            ViolationKind::RoomGated
        } else {
            ViolationKind::RoomUnreachable
        };
        violations.push(Violation::new(kind, &data.starting_room, room_id));
    }
}

fn flood(data: &CampaignData, passable: impl Fn(&crate::campaign::Exit) -> bool) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();

    seen.insert(data.starting_room.clone());
    queue.push_back(data.starting_room.clone());

    while let Some(room_id) = queue.pop_front() {
        let Some(room) = data.rooms.get(&room_id) else {
            continue;
        };
        for exit in room.exits.values() {
            if !passable(exit) {
                continue;
            }
            if data.rooms.contains_key(&exit.target_room_id)
                && seen.insert(exit.target_room_id.clone())
            {
                queue.push_back(exit.target_room_id.clone());
            }
        }
    }

    seen
}
