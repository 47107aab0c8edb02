use super::actions::{PointsAdjustment, UserAction, UserActionResult};
use crate::actor_framework::Entity;
use crate::domain::{SignUp, User, UserPatch};

impl Entity for User {
    type Id = String;
    type CreatePayload = SignUp;
    type Patch = UserPatch;
    type Action = UserAction;
    type ActionResult = UserActionResult;
    type Context = ();

    fn id(&self) -> &String {
        &self.id
    }

    /// Users are keyed by the identity provider's uid.
    fn requested_id(params: &SignUp) -> Option<String> {
        Some(params.profile.id.clone())
    }

    /// Creates a new User with an empty wallet.
    fn from_create(id: String, params: SignUp, _context: &mut ()) -> Result<Self, String> {
        let SignUp {
            profile,
            created_at,
        } = params;
        if id.is_empty() {
            return Err("user id required".to_string());
        }
        if profile.email.is_empty() {
            return Err("email required".to_string());
        }
        Ok(Self {
            id,
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            address: profile.address,
            wallet_points: 0,
            is_first_order_completed: false,
            created_at,
        })
    }

    /// Updates the user's profile information.
    ///
    /// # Fields Updated
    /// - `name`, `email`, `phone`, `address`
    fn on_update(&mut self, patch: UserPatch) -> Result<(), String> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            if email.is_empty() {
                return Err("email required".to_string());
            }
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        Ok(())
    }

    fn handle_action(&mut self, action: UserAction) -> Result<UserActionResult, String> {
        match action {
            UserAction::AdjustPoints(delta) => {
                Ok(UserActionResult::AdjustPoints(self.adjust_points(delta)))
            }
            UserAction::SetPoints(points) => {
                self.wallet_points = points;
                Ok(UserActionResult::SetPoints(points))
            }
            UserAction::CompleteFirstOrder => {
                let flipped = !self.is_first_order_completed;
                self.is_first_order_completed = true;
                Ok(UserActionResult::CompleteFirstOrder(flipped))
            }
        }
    }
}

impl User {
    fn adjust_points(&mut self, delta: i64) -> PointsAdjustment {
        let magnitude = delta.unsigned_abs();
        let balance = if delta >= 0 {
            self.wallet_points.checked_add(magnitude)
        } else {
            self.wallet_points.checked_sub(magnitude)
        };

        match balance {
            Some(balance) => {
                self.wallet_points = balance;
                PointsAdjustment::Applied { balance }
            }
            None => PointsAdjustment::Insufficient {
                requested: magnitude,
                available: self.wallet_points,
            },
        }
    }
}
