use duet_core::utils::MAX_ROOM_MEMBERS;
use duet_core::{MemberId, RoomId};
use std::time::Instant;

/// Result of asking a room to admit a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Room was empty; the member waits for a peer.
    First,
    /// Room had one member, who now has to initiate the offer.
    Second { existing: MemberId },
    Full { member_count: usize },
    AlreadyMember,
}

pub struct Room {
    id: RoomId,
    members: Vec<MemberId>,
    created_at: Instant,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::with_capacity(MAX_ROOM_MEMBERS),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.contains(member)
    }

    pub fn admit(&mut self, member: MemberId) -> Admission {
        if self.contains(&member) {
            return Admission::AlreadyMember;
        }
        if self.members.len() >= MAX_ROOM_MEMBERS {
            return Admission::Full {
                member_count: self.members.len(),
            };
        }

        let existing = self.members.first().copied();
        self.members.push(member);

        match existing {
            Some(existing) => Admission::Second { existing },
            None => Admission::First,
        }
    }

    /// Returns false if the member was not in the room.
    pub fn remove(&mut self, member: &MemberId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != member);
        self.members.len() != before
    }

    pub fn peer_of(&self, member: &MemberId) -> Option<MemberId> {
        if !self.contains(member) {
            return None;
        }
        self.members.iter().find(|m| *m != member).copied()
    }
}
