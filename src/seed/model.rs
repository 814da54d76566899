use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub hashed_password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,   // -> User.id
    pub product_id: String, // -> Product.id
    pub quantity: i32,
    pub total_price: f64,
}

/// Directed edge: `follower_id` follows `followee_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Follow {
    pub follower_id: String,
    pub followee_id: String,
}

/// One generated dataset, written unchanged to every store.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub purchases: Vec<Purchase>,
    pub follows: Vec<Follow>,
}
