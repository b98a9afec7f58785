use crate::model::{RoomOccupancy, Vacancy};

/// Rooms that still have a free slot, in input order.
///
/// Derived data: callers must feed it a fresh read every time, it goes stale as
/// soon as another allocation commits.
#[must_use]
pub fn compute_vacancy(rooms: &[RoomOccupancy]) -> Vec<Vacancy> {
    rooms
        .iter()
        .filter(|entry| entry.occupants < entry.room.capacity)
        .map(|entry| Vacancy {
            room: entry.room.clone(),
            occupants: entry.occupants,
            remaining: entry.room.capacity - entry.occupants,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Room, RoomId, RoomType};

    fn room(id: i32, capacity: u32, occupants: u32) -> RoomOccupancy {
        RoomOccupancy {
            room: Room {
                id: RoomId(id),
                number: format!("A-{}", 100 + id),
                room_type: RoomType::TwoSharing,
                capacity,
                price: 5000.0,
            },
            occupants,
        }
    }

    #[test]
    fn keeps_rooms_with_free_slots() {
        let rooms = [room(1, 2, 0), room(2, 2, 2), room(3, 3, 1)];
        let vacancies = compute_vacancy(&rooms);

        let summary: Vec<_> = vacancies
            .iter()
            .map(|vacancy| (vacancy.room.id, vacancy.remaining))
            .collect();
        assert_eq!(summary, vec![(RoomId(1), 2), (RoomId(3), 2)]);
    }

    #[test]
    fn overfull_rooms_are_not_vacant() {
        // legacy data may already violate the invariant, that must not underflow
        let rooms = [room(1, 2, 3)];
        assert!(compute_vacancy(&rooms).is_empty());
    }

    #[test]
    fn empty_input() {
        assert!(compute_vacancy(&[]).is_empty());
    }
}
