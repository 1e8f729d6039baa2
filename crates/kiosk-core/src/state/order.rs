//! Decision logic for order status transitions.
//!
//! Pure functions over the static transition table in `kiosk_types`. Nothing
//! here touches storage; callers turn a rejected transition into an error.

use crate::KioskError;
use kiosk_types::OrderStatus;

/// Statuses that can only be entered by a staff member.
const STAFF_ONLY: [OrderStatus; 3] = [
	OrderStatus::Preparing,
	OrderStatus::Ready,
	OrderStatus::Completed,
];

pub struct OrderStateMachine;

impl OrderStateMachine {
	/// Whether `(from, to)` is an edge of the transition table.
	///
	/// `from == to` is never an edge; callers treat it as "no change".
	pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
		from.allows(to)
	}

	pub fn requires_staff(status: OrderStatus) -> bool {
		STAFF_ONLY.contains(&status)
	}

	/// Checks a status change requested with an optional staff id.
	///
	/// A staff id that was supplied but is not positive is rejected before the
	/// edge is looked up; a missing one only after the edge is known to exist.
	pub fn validate(
		from: OrderStatus,
		to: OrderStatus,
		staff_id: Option<i64>,
	) -> Result<(), KioskError> {
		let needs_staff = Self::requires_staff(to);
		if needs_staff && staff_id.is_some_and(|id| id <= 0) {
			return Err(KioskError::invalid("staff is mandatory"));
		}
		if !Self::can_transition(from, to) {
			return Err(KioskError::invalid(format!(
				"invalid status transition from {} to {}",
				from, to
			)));
		}
		if needs_staff && staff_id.is_none() {
			return Err(KioskError::invalid("staff is mandatory"));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use OrderStatus::*;

	const EDGES: [(OrderStatus, OrderStatus); 10] = [
		(Open, Cancelled),
		(Open, Pending),
		(Pending, Open),
		(Pending, Received),
		(Pending, Cancelled),
		(Received, Preparing),
		(Received, Cancelled),
		(Preparing, Ready),
		(Preparing, Cancelled),
		(Ready, Completed),
	];

	#[test]
	fn test_exactly_the_listed_edges_are_allowed() {
		let mut all = OrderStatus::ALL.to_vec();
		all.push(Undefined);

		for from in &all {
			for to in &all {
				let expected = EDGES.contains(&(*from, *to));
				assert_eq!(
					OrderStateMachine::can_transition(*from, *to),
					expected,
					"{} -> {}",
					from,
					to
				);
			}
		}
	}

	#[test]
	fn test_staff_requirement() {
		assert!(OrderStateMachine::requires_staff(Preparing));
		assert!(OrderStateMachine::requires_staff(Ready));
		assert!(OrderStateMachine::requires_staff(Completed));
		assert!(!OrderStateMachine::requires_staff(Pending));
		assert!(!OrderStateMachine::requires_staff(Cancelled));
		assert!(!OrderStateMachine::requires_staff(Undefined));
	}

	#[test]
	fn test_validate_messages() {
		assert_eq!(
			OrderStateMachine::validate(Open, Completed, Some(3)),
			Err(KioskError::InvalidInput(
				"invalid status transition from OPEN to COMPLETED".into()
			))
		);
		assert_eq!(
			OrderStateMachine::validate(Preparing, Ready, Some(0)),
			Err(KioskError::InvalidInput("staff is mandatory".into()))
		);
		assert_eq!(
			OrderStateMachine::validate(Preparing, Ready, None),
			Err(KioskError::InvalidInput("staff is mandatory".into()))
		);
		assert_eq!(
			OrderStateMachine::validate(Received, Ready, Some(0)),
			Err(KioskError::InvalidInput("staff is mandatory".into()))
		);
		assert_eq!(
			OrderStateMachine::validate(Open, Completed, None),
			Err(KioskError::InvalidInput(
				"invalid status transition from OPEN to COMPLETED".into()
			))
		);
		assert!(OrderStateMachine::validate(Received, Preparing, Some(7)).is_ok());
		assert!(OrderStateMachine::validate(Open, Pending, None).is_ok());
	}
}
