//! End-to-end tests of the HTTP API against an in-memory platform database
//! and tenant databases in a temporary directory.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kirana_core::Role;
use kirana_db::{NewUser, PlatformDb};
use kirana_server::{app, AppState, ServerConfig, SharedState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    state: SharedState,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            jwt_secret: "integration-secret".to_string(),
            tenant_db_dir: dir.path().join("tenant_dbs"),
            tenant_domain: Some("kirana.test".to_string()),
            ..Default::default()
        };
        let state = AppState::with_platform(PlatformDb::in_memory().await.unwrap(), config);
        state
            .platform
            .users()
            .create(&NewUser {
                username: "root".to_string(),
                email: "root@kirana.test".to_string(),
                password: "rootpass".to_string(),
                role: Role::Superadmin,
                ..Default::default()
            })
            .await
            .unwrap();

        let router = app(state.clone());
        TestApp {
            _dir: dir,
            state,
            router,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        extra: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), &[], None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), &[], Some(body)).await
    }

    async fn login(&self, path: &str, identifier: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            path,
            None,
            &[],
            Some(json!({ "identifier": identifier, "password": password })),
        )
        .await
    }

    async fn superadmin_token(&self) -> String {
        let (status, body) = self.login("/auth/superadmin-login", "root", "rootpass").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_vendor(&self, admin: &str, code: &str, access: Option<Value>) -> i64 {
        let mut form = json!({
            "vendor_name": format!("{} Stationers", code),
            "vendor_code": code,
            "owner_email": format!("owner@{}.np", code),
            "admin_password": "secret123",
            "admin_password2": "secret123",
        });
        if let Some(access) = access {
            form["access"] = access;
        }
        let (status, body) = self.post("/superadmin/vendors", admin, form).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["vendor"]["id"].as_i64().unwrap()
    }

    async fn vendor_token(&self, code: &str) -> String {
        let (status, body) = self.login("/auth/vendor-login", code, "secret123").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn stationery_product(&self, token: &str, sku: &str, price_paisa: i64, qty: i64) -> i64 {
        let (status, category) = self
            .post(
                "/inventory/categories",
                token,
                json!({ "name": format!("Pens {}", sku), "category_type": "stationery" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{category}");

        let (status, product) = self
            .post(
                "/inventory/products",
                token,
                json!({
                    "sku": sku,
                    "name": format!("Gel pen {}", sku),
                    "category_id": category["id"],
                    "cost_price_paisa": price_paisa / 2,
                    "selling_price_paisa": price_paisa,
                    "initial_quantity": qty,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{product}");
        product["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_superadmin_must_use_console_login() {
    let app = TestApp::new().await;

    let (status, body) = app.login("/auth/user-login", "root", "rootpass").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Please use the superadmin login page.");

    let (status, body) = app.login("/auth/superadmin-login", "root", "rootpass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["realm"], "platform");
    assert_eq!(body["role"], "superadmin");
    assert!(body["tenant"].is_null());
}

#[tokio::test]
async fn test_vendor_lifecycle_and_login() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    let id = app.create_vendor(&admin, "ramstore", None).await;

    let (status, dashboard) = app.get("/superadmin/dashboard", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["counts"]["total"], 1);
    assert_eq!(dashboard["counts"]["active"], 1);

    let vendor = app.vendor_token("ramstore").await;
    let (status, me) = app.get("/auth/me", &vendor).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["realm"], "tenant");
    assert_eq!(me["role"], "tenant_admin");
    assert_eq!(me["tenant"]["code"], "ramstore");

    let (status, body) = app
        .post(&format!("/superadmin/vendors/{}/deactivate", id), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vendor \"ramstore Stationers\" has been deactivated.");

    // The shop session no longer resolves to a vendor.
    let (status, body) = app.get("/inventory/products", &vendor).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let (status, body) = app.login("/auth/vendor-login", "ramstore", "secret123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials or unauthorized access.");
}

#[tokio::test]
async fn test_console_is_superadmin_only() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    app.create_vendor(&admin, "ramstore", None).await;
    let vendor = app.vendor_token("ramstore").await;

    let (status, body) = app.get("/superadmin/dashboard", &vendor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app
        .send(Method::GET, "/superadmin/dashboard", None, &[], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_and_receipt() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    app.create_vendor(&admin, "ramstore", None).await;
    let token = app.vendor_token("ramstore").await;
    let product_id = app.stationery_product(&token, "PEN-01", 5_000, 20).await;

    let (status, hits) = app.get("/sales/api/search-product?q=gel", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits["products"][0]["id"], product_id);

    let (status, sale) = app
        .post(
            "/sales/api/create-sale",
            &token,
            json!({
                "customer_type": "regular",
                "customer_phone": "9800000001",
                "customer_name": "Hari",
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "payment_method": "cash",
                "paid_amount": "50",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{sale}");
    assert_eq!(sale["success"], true);
    assert_eq!(sale["message"], "Sale created successfully");
    let sale_number = sale["sale_number"].as_str().unwrap().to_string();
    let receipt_number = sale["receipt_number"].as_str().unwrap().to_string();
    assert!(sale_number.starts_with("SAL"));
    assert!(receipt_number.starts_with("REC"));

    // 2 x Rs. 50 + 13% VAT = Rs. 113, Rs. 50 paid: Rs. 63 on credit.
    let (status, customer) = app.get("/sales/api/get-customer?phone=9800000001", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["found"], true);
    assert_eq!(customer["current_credit"], 6_300);

    let (_, stock) = app.get(&format!("/inventory/stock/{}", product_id), &token).await;
    assert_eq!(stock["line"]["quantity_in_stock"], 18);

    let (status, detail) = app
        .get(&format!("/sales/number/{}", sale_number), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let sale_id = detail["sale"]["id"].as_i64().unwrap();
    assert_eq!(detail["sale"]["payment_status"], "partial");

    let (status, receipt) = app.get(&format!("/sales/{}/receipt", sale_id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["currency_code"], "NPR");
    assert_eq!(receipt["receipt"]["total"], 11_300);
    assert_eq!(receipt["receipt"]["due"], 6_300);

    let (status, text) = app
        .get(&format!("/sales/{}/receipt.txt", sale_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.as_str().unwrap().contains(&receipt_number));
}

#[tokio::test]
async fn test_checkout_errors_use_pos_shape() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    app.create_vendor(&admin, "ramstore", None).await;
    let token = app.vendor_token("ramstore").await;

    let (status, body) = app
        .post(
            "/sales/api/create-sale",
            &token,
            json!({ "items": [], "payment_method": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_credit_payment() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    app.create_vendor(&admin, "ramstore", None).await;
    let token = app.vendor_token("ramstore").await;
    let product_id = app.stationery_product(&token, "NB-01", 10_000, 5).await;

    let (status, _) = app
        .post(
            "/sales/api/create-sale",
            &token,
            json!({
                "customer_phone": "9800000002",
                "customer_name": "Sita",
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "payment_method": "credit",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/customers/9800000002/pay", &token, json!({ "amount": "abc" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Enter a valid payment amount.");

    let (status, body) = app
        .post("/customers/9800000002/pay", &token, json!({ "amount": "500" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Payment exceeds current credit balance.");

    let (status, body) = app
        .post("/customers/9800000002/pay", &token, json!({ "amount": "13" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Payment recorded successfully.");
    assert_eq!(body["customer"]["current_credit_paisa"], 10_000);
    assert_eq!(body["transaction"]["balance_after_paisa"], 10_000);

    let (status, history) = app.get("/customers/9800000002/credit", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["transactions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_vendors_do_not_see_each_other() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    app.create_vendor(&admin, "ramstore", None).await;
    app.create_vendor(&admin, "shyamstore", None).await;

    let ram = app.vendor_token("ramstore").await;
    let shyam = app.vendor_token("shyamstore").await;
    app.stationery_product(&ram, "RAM-01", 1_000, 3).await;

    let (_, ram_products) = app.get("/inventory/products", &ram).await;
    assert_eq!(ram_products.as_array().unwrap().len(), 1);
    let (_, shyam_products) = app.get("/inventory/products", &shyam).await;
    assert!(shyam_products.as_array().unwrap().is_empty());

    // A shop token cannot be pointed at another vendor by header: the
    // session's own vendor wins.
    let (status, products) = app
        .send(
            Method::GET,
            "/inventory/products",
            Some(&shyam),
            &[("x-tenant-code", "ramstore")],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(products.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_tenant_from_host_for_staff_login() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    app.create_vendor(&admin, "ramstore", None).await;
    let owner = app.vendor_token("ramstore").await;

    let (status, body) = app
        .post(
            "/users",
            &owner,
            json!({
                "username": "sita",
                "email": "sita@ramstore.np",
                "password": "cashier1",
                "password2": "cashier1",
                "role": "cashier",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let credentials = json!({ "identifier": "sita", "password": "cashier1" });
    let (status, _) = app
        .send(Method::POST, "/auth/user-login", None, &[], Some(credentials.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/user-login",
            None,
            &[("host", "ramstore.kirana.test")],
            Some(credentials),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["role"], "cashier");
    let cashier = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/users", &cashier).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only admins and managers can manage users.");
}

#[tokio::test]
async fn test_section_access_is_enforced() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    let id = app
        .create_vendor(
            &admin,
            "ramstore",
            Some(json!({
                "customers": true,
                "vendors": true,
                "inventory": true,
                "sales": true,
                "reports": false,
            })),
        )
        .await;
    let vendor = app.vendor_token("ramstore").await;

    let (status, body) = app.get("/reports/dashboard", &vendor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied for this section.");

    let (status, _) = app.get("/inventory/products", &vendor).await;
    assert_eq!(status, StatusCode::OK);

    // A superadmin viewing the shop is never blocked.
    let (status, viewing) = app
        .post(&format!("/superadmin/vendors/{}/login-as", id), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{viewing}");
    assert_eq!(viewing["message"], "Now viewing as: ramstore Stationers");
    let viewing = viewing["token"].as_str().unwrap();

    let (status, body) = app.get("/reports/dashboard", viewing).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total_products"], 0);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;

    let (status, _) = app.post("/auth/logout", &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/auth/me", &admin).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication required.");
}

#[tokio::test]
async fn test_delete_vendor_removes_database() {
    let app = TestApp::new().await;
    let admin = app.superadmin_token().await;
    let id = app.create_vendor(&admin, "ramstore", None).await;
    let tenant = app.state.platform.tenants().get(id).await.unwrap();
    let path = app.state.registry.database_path(&tenant);
    assert!(path.exists());

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/superadmin/vendors/{}", id),
            Some(&admin),
            &[],
            Some(json!({ "confirm": "ramstore", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Superadmin password is incorrect.");

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/superadmin/vendors/{}", id),
            Some(&admin),
            &[],
            Some(json!({ "confirm": "ramstore", "password": "rootpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Vendor \"ramstore Stationers\" deleted successfully.");
    assert!(!path.exists());
}
