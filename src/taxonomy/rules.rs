// ==========================================
// 物料损耗分析引擎 - 物料分类规则表
// ==========================================
// 职责: 两级分类规则（分类 → 子分类）的数据定义
// 说明:
// - 规则按顺序匹配，首个命中者胜出
// - 模式作用于归一化文本（去重音、小写）
// - 子分类列表中 ".*" 为兜底项，须放在最后
// ==========================================

use serde::{Deserialize, Serialize};

/// 未命中任何分类时的兜底分类
pub const FALLBACK_CATEGORY: &str = "Otros";

/// 子分类规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRuleSpec {
    pub name: String,
    pub pattern: String,
}

/// 分类规则（含有序子分类规则）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRuleSpec {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub subrules: Vec<SubRuleSpec>,
}

impl CategoryRuleSpec {
    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            subrules: Vec::new(),
        }
    }

    pub fn sub(mut self, name: &str, pattern: &str) -> Self {
        self.subrules.push(SubRuleSpec {
            name: name.to_string(),
            pattern: pattern.to_string(),
        });
        self
    }
}

// ===== 分类名称 =====
pub const CAT_ADHESIVES: &str = "Adhesivos";
pub const CAT_ADDITIVES: &str = "Aditivos";
pub const CAT_SUGAR: &str = "Azúcar";
pub const CAT_GASES: &str = "Gases";
pub const CAT_BAGS: &str = "Empaque / Bolsas";
pub const CAT_GLASS: &str = "Envases (Vidrio)";
pub const CAT_SYRUPS: &str = "Concentrados / Jarabes";
pub const CAT_LABELS: &str = "Etiquetas";
pub const CAT_CROWNS: &str = "Tapas Metálicas (Hermetapas)";
pub const CAT_FILMS: &str = "Películas / Films (Emplaye / Termoencogible / Stretch)";
pub const CAT_PREFORMS: &str = "Preformas PET";
pub const CAT_RESINS: &str = "Resinas PET";
pub const CAT_SEPARATORS: &str = "Separadores / Cartón";
pub const CAT_SCREW_CAPS: &str = "Taparroscas";

/// 标准分类规则表
///
/// 与历史版本的差异：
/// - 预型件的「Proveedor / Maquila」前置，避免被口径规则抢先命中
/// - 气体的「Accesorios CO₂」前置于「CO₂」
/// - 防伪带不再使用否定前瞻；含 co2 的文本已先被「Gases」截获
pub fn default_rule_specs() -> Vec<CategoryRuleSpec> {
    vec![
        CategoryRuleSpec::new(CAT_ADHESIVES, r"adhesiv|hot.?melt|euromelt|innocoll|sanyhot")
            .sub("Hot-melt / Euromelt / Innocoll / Sanyhot", r"hot.?melt|euromelt|innocoll|sanyhot"),
        CategoryRuleSpec::new(CAT_ADDITIVES, r"aditiv|antiyellow|clarificant")
            .sub("Antiyellow / Clarificante", r"antiyellow|clarificant"),
        CategoryRuleSpec::new(CAT_SUGAR, r"\bazucar\b").sub("Refinada", r"\bazucar\b|\brefinad"),
        CategoryRuleSpec::new(CAT_GASES, r"\bco2\b|gas\s*carbonic|gas\s*nitr(o|og)gen")
            .sub("Accesorios CO₂", r"banda\s+de\s+garantia.*co2")
            .sub("CO₂", r"\bco2\b|carbonic")
            .sub("Nitrógeno", r"nitr(o|og)gen"),
        CategoryRuleSpec::new(CAT_BAGS, r"\bbolsa\b|banda\s+de\s+garantia|\bpetg\b")
            .sub("Bolsas", r"\bbolsa\b")
            .sub("Bandas PETG", r"\bpetg\b|banda\s+de\s+garantia"),
        CategoryRuleSpec::new(CAT_GLASS, r"botella.*vidrio|vidrio\s*(nr|no\s*retorn)")
            .sub("Botella NR", r"botella.*vidrio|vidrio\s*(nr|no\s*retorn)"),
        CategoryRuleSpec::new(CAT_SYRUPS, r"\bjarab|concentrad")
            .sub("Jarabe", r"\bjarab")
            .sub("Concentrado", r"concentrad"),
        CategoryRuleSpec::new(CAT_LABELS, r"\betiqu")
            .sub("Coca-Cola", r"coca\s*cola|cc\b")
            .sub("Cristal/Agua", r"cristal|agua")
            .sub("Sprite", r"\bsprite\b")
            .sub("Fanta", r"\bfanta\b")
            .sub("Fresca", r"\bfresca\b")
            .sub("Sidral Mundet", r"sidral|mundet")
            .sub("Valle / Té", r"\bvalle\b|\bte\b")
            .sub("Genérica", r".*"),
        CategoryRuleSpec::new(CAT_CROWNS, r"hermetapa|pry[ -]?off|tapon\s*corona|chapa\b")
            .sub("Hermetapa / Pry-off", r"hermetapa|pry[ -]?off"),
        CategoryRuleSpec::new(CAT_FILMS, r"pelicul|sleeve|termoencog|stretch\s*film|emplaye|x\s*pack")
            .sub("Termoencogible", r"termoencog|sleeve")
            .sub("Stretch Film / Emplaye", r"stretch\s*film|emplaye|x\s*pack"),
        CategoryRuleSpec::new(CAT_PREFORMS, r"\bpreform|prefo\b")
            .sub("Proveedor / Maquila", r"alpla|petstar|maquila")
            .sub("Peso 11–20 g", r"\b(1[1-9](?:\.\d)?)\s*gr?\b")
            .sub("Peso 21–35 g", r"\b(2[1-9]|3[0-5])(?:\.\d)?\s*gr?\b")
            .sub("Peso 36–60 g", r"\b(3[6-9]|[4-5]\d|60)(?:\.\d)?\s*gr?\b")
            .sub("Boca 26 mm / 2622", r"\b26\s*mm\b|\b2622\b")
            .sub("Boca 28 mm / 1873", r"\b28\s*mm\b|\b1873\b")
            .sub("Genérica", r".*"),
        CategoryRuleSpec::new(CAT_RESINS, r"\bresin|pcr001|mb\+?912|recuperad")
            .sub("Virgen (MB+912)", r"virgen|mb\+?912")
            .sub("Reciclada PCR (PCR001)", r"pcr001|recicl")
            .sub("Recuperada / Granel", r"recuperad|granel")
            .sub("Genérica", r".*"),
        CategoryRuleSpec::new(CAT_SEPARATORS, r"separador|carton|corrugad|charola|bandeja|division")
            .sub("Separadores", r"\bseparador\b")
            .sub("Cartón / Corrugado", r"carton|corrugad|charola|bandeja|division"),
        CategoryRuleSpec::new(CAT_SCREW_CAPS, r"taparrosc|twist\s*off\s*metalica|cap\b")
            .sub("Rosca 1810", r"\b1810\b")
            .sub("Rosca 1873", r"\b1873\b")
            .sub("26 mm (2622/AP)", r"\b26(\s*mm)?\b|\b2622\b|\bap\b")
            .sub("28 mm", r"\b28\s*mm\b")
            .sub("Twist-off 38 mm", r"twist\s*off.*\b38\s*mm\b")
            .sub("Genérica", r".*"),
    ]
}
