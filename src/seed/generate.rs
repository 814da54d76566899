use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};

use crate::seed::model::{Fixture, Follow, Product, Purchase, Role, User};

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Chloe", "Daniel", "Emma", "Felix", "Grace", "Hugo", "Ines", "Jules",
    "Karim", "Lea", "Mathis", "Nora", "Oscar", "Pauline", "Quentin", "Rose", "Sami", "Theo",
];

const LAST_NAMES: &[&str] = &[
    "Martin", "Bernard", "Dubois", "Thomas", "Robert", "Richard", "Petit", "Durand", "Leroy",
    "Moreau", "Simon", "Laurent", "Lefebvre", "Michel", "Garcia", "David", "Bertrand", "Roux",
];

const ADJECTIVES: &[&str] = &[
    "compact", "classic", "wireless", "organic", "sturdy", "vintage", "smart", "portable",
    "handmade", "minimal",
];

const NOUNS: &[&str] = &[
    "lamp", "backpack", "kettle", "notebook", "speaker", "chair", "bottle", "watch", "blanket",
    "mug", "headset", "planter",
];

/// Target cardinalities for one seeding run.
#[derive(Debug, Clone, Copy)]
pub struct SeedConfig {
    pub users: usize,
    pub products: usize,
    pub purchases: usize,
    /// Random draws; self and duplicate pairs are dropped, so the inserted
    /// edge count is at most this.
    pub follow_attempts: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            users: 10_000,
            products: 1_000,
            purchases: 100_000,
            follow_attempts: 100_000,
        }
    }
}

fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, words: &'a [&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

fn generate_users<R: Rng + ?Sized>(count: usize, password_hash: &str, rng: &mut R) -> Vec<User> {
    (1..=count)
        .map(|n| {
            let first = pick(rng, FIRST_NAMES);
            let last = pick(rng, LAST_NAMES);
            User {
                id: random_id(rng),
                email: format!(
                    "{}.{}{}@example.com",
                    first.to_lowercase(),
                    last.to_lowercase(),
                    n
                ),
                hashed_password: password_hash.to_string(),
                full_name: format!("{first} {last}"),
                role: if rng.gen_bool(0.5) { Role::User } else { Role::Admin },
            }
        })
        .collect()
}

fn generate_products<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Product> {
    (1..=count)
        .map(|n| {
            let adjective = pick(rng, ADJECTIVES);
            let noun = pick(rng, NOUNS);
            Product {
                id: random_id(rng),
                name: format!("{adjective} {noun}"),
                price: round2(rng.gen_range(1.0..100.0)),
                description: format!("A {adjective} {noun} for everyday use, item #{n}."),
                image: format!("https://images.example.com/products/{n}.jpg"),
            }
        })
        .collect()
}

fn generate_purchases<R: Rng + ?Sized>(
    count: usize,
    users: &[User],
    products: &[Product],
    rng: &mut R,
) -> Vec<Purchase> {
    let (Some(_), Some(_)) = (users.first(), products.first()) else {
        return Vec::new();
    };
    (0..count)
        .map(|_| {
            let user = &users[rng.gen_range(0..users.len())];
            let product = &products[rng.gen_range(0..products.len())];
            let quantity = rng.gen_range(1..=10);
            Purchase {
                id: random_id(rng),
                user_id: user.id.clone(),
                product_id: product.id.clone(),
                quantity,
                total_price: round2(f64::from(quantity) * product.price),
            }
        })
        .collect()
}

fn generate_follows<R: Rng + ?Sized>(attempts: usize, users: &[User], rng: &mut R) -> Vec<Follow> {
    if users.len() < 2 {
        return Vec::new();
    }
    let mut seen: HashSet<(usize, usize)> = HashSet::with_capacity(attempts);
    let mut follows = Vec::with_capacity(attempts);
    for _ in 0..attempts {
        let follower = rng.gen_range(0..users.len());
        let followee = rng.gen_range(0..users.len());
        if follower != followee && seen.insert((follower, followee)) {
            follows.push(Follow {
                follower_id: users[follower].id.clone(),
                followee_id: users[followee].id.clone(),
            });
        }
    }
    follows
}

/// Generates a full dataset. Purchases and follows only reference users and
/// products generated in the same call.
pub fn generate_fixture<R: Rng + ?Sized>(
    config: &SeedConfig,
    password_hash: &str,
    rng: &mut R,
) -> anyhow::Result<Fixture> {
    if config.purchases > 0 && (config.users == 0 || config.products == 0) {
        anyhow::bail!("purchases need at least one user and one product");
    }
    let users = generate_users(config.users, password_hash, rng);
    let products = generate_products(config.products, rng);
    let purchases = generate_purchases(config.purchases, &users, &products, rng);
    let follows = generate_follows(config.follow_attempts, &users, rng);
    Ok(Fixture {
        users,
        products,
        purchases,
        follows,
    })
}
