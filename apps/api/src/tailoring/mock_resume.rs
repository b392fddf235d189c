use serde_json::{json, Value};

/// Fixed id under which the mock resume is always available.
pub const MOCK_RESUME_ID: &str = "mock-resume-id";

/// Development fixture in JSON Resume format, used when a submission asks for mock data.
pub fn mock_json_resume() -> Value {
    json!({
        "basics": {
            "name": "Alex Morgan",
            "label": "Senior Backend Engineer",
            "email": "alex.morgan@example.com",
            "phone": "+1 555 0100",
            "summary": "Backend engineer focused on high-throughput services, data pipelines and developer tooling. Builds and operates distributed systems in Rust, Go and TypeScript.",
            "location": { "city": "Portland", "countryCode": "US" },
            "profiles": []
        },
        "work": [
            {
                "name": "Northwind Logistics",
                "position": "Staff Engineer",
                "location": "Portland, OR",
                "startDate": "2022-03",
                "summary": "Leads the routing platform team.",
                "highlights": [
                    "Rebuilt the route optimisation service in Rust, cutting p99 latency from 900ms to 120ms.",
                    "Introduced event-sourced shipment tracking processing 2M events per day.",
                    "Mentored six engineers through the platform migration."
                ]
            },
            {
                "name": "Brightline Analytics",
                "position": "Software Engineer",
                "location": "Remote",
                "startDate": "2018-06",
                "endDate": "2022-02",
                "summary": "Built ingestion pipelines for customer analytics.",
                "highlights": [
                    "Designed a Kafka-based ingestion layer handling 40k messages per second.",
                    "Shipped CI/CD for 12 services with zero-downtime deploys."
                ]
            }
        ],
        "education": [
            {
                "institution": "Oregon State University",
                "area": "Computer Science",
                "studyType": "Bachelor",
                "startDate": "2014-09",
                "endDate": "2018-06"
            }
        ],
        "skills": [
            { "name": "Languages", "keywords": ["Rust", "Go", "TypeScript", "SQL"] },
            { "name": "Infrastructure", "keywords": ["Kubernetes", "PostgreSQL", "Kafka", "Redis"] }
        ],
        "languages": [
            { "language": "English", "fluency": "Native speaker" },
            { "language": "Spanish", "fluency": "Professional working proficiency" }
        ]
    })
}
