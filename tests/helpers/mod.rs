// ==========================================
// 集成测试公共夹具
// ==========================================

#![allow(dead_code)]

pub mod builders;
pub mod fake_lms;
pub mod fake_warehouse;
pub mod mock_config;
