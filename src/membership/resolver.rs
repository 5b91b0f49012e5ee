// ==========================================
// 培训课程选课供给系统 - 成员候选解析器
// ==========================================
// 职责: 培训课程定义 → {学号: 资格标签集合}
// 流程:
//   1. 学年编码 → 学年区间（格式错误立即失败）
//   2. 枚举学年季度（production 环境可从覆写季度开始）
//   3. 每个季度并发查询: 注册数据；普查日前另查录取数据
//   4. 标签按学号做并集合并
// 红线: 成员来源由枚举显式映射，不做按名称的动态调用
// ==========================================

use crate::config::ProvisionerConfigReader;
use crate::domain::enrollment::EligibleTerms;
use crate::domain::ids::{AcademicYear, EligibilityTag, QuarterCode, StudentId};
use crate::domain::training_course::TrainingCourse;
use crate::domain::types::{EligibilitySource, MembershipType};
use crate::membership::calendar::info_for_quarter;
use crate::membership::error::MembershipError;
use crate::membership::mock::load_test_membership;
use crate::membership::queries::{admissions_query, registration_query, QueryKind};
use crate::membership::warehouse::{execute_with_timeout, Warehouse};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 候选名单: 学号 → 资格标签集合
pub type CandidateMap = BTreeMap<StudentId, EligibleTerms>;

/// 成员来源
///
/// MembershipType → 解析实现 的显式映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipSource {
    /// 本地测试名单文件
    TestFile,
    /// 注册 + 录取数据
    Warehouse,
}

impl MembershipSource {
    pub fn for_type(membership_type: MembershipType) -> Self {
        match membership_type {
            MembershipType::Test => MembershipSource::TestFile,
            // 复训候选与首修同源，由课程类型筛选区分
            MembershipType::TitleVi | MembershipType::TitleViBooster => MembershipSource::Warehouse,
        }
    }
}

// ==========================================
// MembershipResolver - 成员候选解析器
// ==========================================
pub struct MembershipResolver<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    warehouse: Arc<dyn Warehouse>,
    config: Arc<C>,
}

impl<C> MembershipResolver<C>
where
    C: ProvisionerConfigReader + ?Sized,
{
    /// 创建新的解析器
    ///
    /// # 参数
    /// - warehouse: 数据仓库实现
    /// - config: 配置读取器
    pub fn new(warehouse: Arc<dyn Warehouse>, config: Arc<C>) -> Self {
        Self { warehouse, config }
    }

    /// 解析培训课程的候选成员
    ///
    /// # 返回
    /// - Ok(CandidateMap): 候选名单（可能为空，空名单的含义由调用方判定）
    /// - Err(MembershipError::Parse): 学年编码格式错误
    #[instrument(skip(self, training_course), fields(term_id = %training_course.term_id, blueprint = %training_course.blueprint_course_id))]
    pub async fn resolve(&self, training_course: &TrainingCourse) -> Result<CandidateMap, MembershipError> {
        let ay = training_course.academic_year()?;

        let candidates = match MembershipSource::for_type(training_course.membership_type) {
            MembershipSource::TestFile => self.test_membership(ay).await?,
            MembershipSource::Warehouse => self.warehouse_candidates(training_course, ay).await?,
        };

        info!(
            membership_type = %training_course.membership_type,
            candidates = candidates.len(),
            "候选成员解析完成"
        );
        Ok(candidates)
    }

    async fn test_membership(&self, ay: AcademicYear) -> Result<CandidateMap, MembershipError> {
        let path = self
            .config
            .get_membership_mock_file()
            .await
            .map_err(|e| MembershipError::Config(e.to_string()))?
            .ok_or_else(|| MembershipError::Config("未配置测试名单文件 membership.mock_file".to_string()))?;

        load_test_membership(Path::new(&path), ay)
    }

    async fn warehouse_candidates(
        &self,
        training_course: &TrainingCourse,
        ay: AcademicYear,
    ) -> Result<CandidateMap, MembershipError> {
        let start_override = self
            .config
            .get_start_quarter_override(&training_course.term_id)
            .await
            .map_err(|e| MembershipError::Config(e.to_string()))?;
        // 覆写错误立即失败，不退回整学年查询
        let start = match start_override {
            Some(o) => {
                let q = ay.start_quarter(&o.start_quarter)?;
                info!(start_quarter = %q, "应用学年起始季度覆写");
                Some(q)
            }
            None => None,
        };

        let timeout_secs = self
            .config
            .get_warehouse_timeout_secs()
            .await
            .map_err(|e| MembershipError::Config(e.to_string()))?;
        let timeout = Duration::from_secs(timeout_secs);

        let quarters = ay.quarters_from(start);
        debug!(quarters = ?quarters.iter().map(|q| q.code()).collect::<Vec<_>>(), "查询季度列表");

        // 各季度查询互相独立，可并发
        let per_quarter =
            try_join_all(quarters.iter().map(|q| self.candidates_for_quarter(*q, timeout))).await?;

        let mut merged = CandidateMap::new();
        for hits in per_quarter {
            for (student_id, tag) in hits {
                merged.entry(student_id).or_default().insert(tag);
            }
        }
        Ok(merged)
    }

    async fn candidates_for_quarter(
        &self,
        quarter: QuarterCode,
        timeout: Duration,
    ) -> Result<Vec<(StudentId, EligibilityTag)>, MembershipError> {
        let info = info_for_quarter(self.warehouse.as_ref(), quarter, timeout).await?;

        let mut hits: Vec<(StudentId, EligibilityTag)> = self
            .students(&registration_query(quarter), QueryKind::Registration, timeout)
            .await?
            .into_iter()
            .map(|sid| (sid, EligibilityTag::new(quarter, EligibilitySource::Registration)))
            .collect();
        let registered = hits.len();

        if info.census_day_status.is_before() {
            let admitted = self
                .students(&admissions_query(quarter), QueryKind::Admissions, timeout)
                .await?;
            hits.extend(
                admitted
                    .into_iter()
                    .map(|sid| (sid, EligibilityTag::new(quarter, EligibilitySource::Admissions))),
            );
        }

        debug!(
            quarter = %quarter,
            before_census = info.census_day_status.is_before(),
            registered,
            total = hits.len(),
            "季度候选查询完成"
        );
        Ok(hits)
    }

    async fn students(
        &self,
        query: &str,
        kind: QueryKind,
        timeout: Duration,
    ) -> Result<Vec<StudentId>, MembershipError> {
        let rows = execute_with_timeout(self.warehouse.as_ref(), query, kind, timeout).await?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            match row.get("StudentNumber").map(StudentId::from_warehouse_value) {
                Some(Ok(sid)) => students.push(sid),
                Some(Err(e)) => warn!(query_kind = kind.as_str(), error = %e, "忽略无效学号"),
                None => warn!(query_kind = kind.as_str(), "行缺少 StudentNumber 列"),
            }
        }
        Ok(students)
    }
}
