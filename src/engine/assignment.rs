// ==========================================
// 培训课程选课供给系统 - 确定性分配函数
// ==========================================
// 职责: 学号 → 平行课程副本序号 / 分班序号
// 红线: 纯函数，只依赖学号的 UTF-8 字节（无浮点、无区域设置）
// 红线: 课程与分班使用不同的哈希派生，避免两个维度相关聚集
// ==========================================
// 课程: FNV-1a 64 位
// 分班: djb2 32 位 (hash * 33 + byte)
// ==========================================

use crate::domain::ids::StudentId;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const DJB2_SEED: u32 = 5381;

/// FNV-1a 64 位哈希
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// djb2 32 位哈希
pub fn djb2_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(DJB2_SEED, |hash, b| {
        hash.wrapping_mul(33).wrapping_add(u32::from(*b))
    })
}

/// 课程副本序号 [0, course_count)
///
/// course_count 为 0 时返回 0（定义校验保证 course_count >= 1）
pub fn course_index(student_id: &StudentId, course_count: u32) -> u32 {
    if course_count == 0 {
        return 0;
    }
    (fnv1a_64(student_id.as_str().as_bytes()) % u64::from(course_count)) as u32
}

/// 分班序号 [0, section_count)
///
/// section_count 为 0 表示不分班，返回 None
pub fn section_index(student_id: &StudentId, section_count: u32) -> Option<u32> {
    if section_count == 0 {
        return None;
    }
    Some(djb2_32(student_id.as_str().as_bytes()) % section_count)
}
