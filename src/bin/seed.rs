use axum_restaurant_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "Admin", "admin@example.com", "admin").await?;
    let staff_id = ensure_user(&pool, "Front Desk", "staff@example.com", "staff").await?;
    let customer_id = ensure_user(&pool, "Customer", "customer@example.com", "customer").await?;
    seed_menu(&pool).await?;
    seed_tables(&pool).await?;

    println!("Seed completed. Admin: {admin_id}, Staff: {staff_id}, Customer: {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_menu(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let items = vec![
        ("Margherita Pizza", "Tomato, mozzarella, basil", 1250, true),
        ("Spaghetti Carbonara", "Guanciale, pecorino, egg", 1400, true),
        ("Caesar Salad", "Romaine, parmesan, croutons", 950, true),
        ("Tiramisu", "Espresso-soaked ladyfingers", 650, true),
        ("Seasonal Special", "Ask your waiter", 1800, false),
    ];

    for (name, desc, price, available) in items {
        sqlx::query(
            r#"
            INSERT INTO menu_items (id, name, description, price, available)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price as i64)
        .bind(available)
        .execute(pool)
        .await?;
    }

    println!("Seeded menu items");
    Ok(())
}

async fn seed_tables(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (number, capacity) in [(1, 2), (2, 2), (3, 4), (4, 4), (5, 6), (6, 8)] {
        sqlx::query(
            r#"
            INSERT INTO dining_tables (id, number, capacity, active)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(number)
        .bind(capacity)
        .execute(pool)
        .await?;
    }

    println!("Seeded tables");
    Ok(())
}
