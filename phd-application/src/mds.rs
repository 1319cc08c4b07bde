//! Configuration snapshot of a connection
//!
//! The MDS (medical device system) object with the metric objects negotiated
//! during configuration. The manager builds it from the agent's
//! configuration report; the agent builds its own from its specialization.

use phd_asn1::{
    find_attribute, upsert_attribute, AttrValMapEntry, Ava, ConfigObject, MderWriter, Type,
};
use phd_core::nomenclature::*;
use phd_core::protocol::MDS_HANDLE;
use phd_core::{PhdError, PhdResult};
use std::collections::BTreeMap;

/// Build an AVA whose value is an octet string
pub fn octet_string_attribute(attribute_id: u16, bytes: &[u8]) -> PhdResult<Ava> {
    let mut writer = MderWriter::new();
    writer.write_octet_string(bytes)?;
    Ok(Ava::new(attribute_id, writer.into_bytes()))
}

/// One configured object of the MDS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdsObject {
    pub obj_class: u16,
    pub obj_handle: u16,
    pub attributes: Vec<Ava>,
    attr_val_map: Vec<AttrValMapEntry>,
}

impl MdsObject {
    /// Build an object from its configuration report entry
    ///
    /// Fails if the attribute-value map is present but malformed.
    pub fn from_config(object: &ConfigObject) -> PhdResult<Self> {
        let mut mds_object = Self {
            obj_class: object.obj_class,
            obj_handle: object.obj_handle,
            attributes: object.attributes.clone(),
            attr_val_map: Vec::new(),
        };
        mds_object.refresh_value_map()?;
        Ok(mds_object)
    }

    pub fn attribute(&self, attribute_id: u16) -> Option<&Ava> {
        find_attribute(&self.attributes, attribute_id)
    }

    /// Metric type from `MDC_ATTR_ID_TYPE`
    pub fn metric_type(&self) -> Option<Type> {
        self.attribute(MDC_ATTR_ID_TYPE)?.value().ok()
    }

    /// Unit from `MDC_ATTR_UNIT_CODE`
    pub fn unit_code(&self) -> Option<u16> {
        self.attribute(MDC_ATTR_UNIT_CODE)?.value().ok()
    }

    /// Layout of this object's fixed-format observations
    pub fn attribute_value_map(&self) -> &[AttrValMapEntry] {
        &self.attr_val_map
    }

    /// Size in bytes of one fixed-format observation
    pub fn fixed_observation_len(&self) -> usize {
        self.attr_val_map
            .iter()
            .map(|entry| usize::from(entry.attribute_len))
            .sum()
    }

    fn set_attribute(&mut self, ava: Ava) -> PhdResult<()> {
        let is_map = ava.attribute_id == MDC_ATTR_ATTRIBUTE_VAL_MAP;
        upsert_attribute(&mut self.attributes, ava);
        if is_map {
            self.refresh_value_map()?;
        }
        Ok(())
    }

    fn refresh_value_map(&mut self) -> PhdResult<()> {
        self.attr_val_map = match self.attribute(MDC_ATTR_ATTRIBUTE_VAL_MAP) {
            Some(ava) => ava.value()?,
            None => Vec::new(),
        };
        Ok(())
    }

    fn to_config(&self) -> ConfigObject {
        ConfigObject {
            obj_class: self.obj_class,
            obj_handle: self.obj_handle,
            attributes: self.attributes.clone(),
        }
    }
}

/// Negotiated configuration of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mds {
    system_id: Vec<u8>,
    dev_config_id: u16,
    attributes: Vec<Ava>,
    objects: BTreeMap<u16, MdsObject>,
}

impl Mds {
    /// Create an MDS carrying its identifying attributes and no objects
    pub fn new(system_id: &[u8], dev_config_id: u16) -> PhdResult<Self> {
        let attributes = vec![
            Ava::from_value(MDC_ATTR_ID_HANDLE, &MDS_HANDLE)?,
            octet_string_attribute(MDC_ATTR_SYS_ID, system_id)?,
            Ava::from_value(MDC_ATTR_DEV_CONFIG_ID, &dev_config_id)?,
        ];
        Ok(Self {
            system_id: system_id.to_vec(),
            dev_config_id,
            attributes,
            objects: BTreeMap::new(),
        })
    }

    /// Create an MDS from a configuration's object list
    ///
    /// # Arguments
    ///
    /// * `system_id` - System id of the agent owning the configuration
    /// * `dev_config_id` - Configuration id
    /// * `objects` - Configured objects; handle 0 is reserved for the MDS
    pub fn from_config(
        system_id: &[u8],
        dev_config_id: u16,
        objects: &[ConfigObject],
    ) -> PhdResult<Self> {
        let mut mds = Self::new(system_id, dev_config_id)?;
        for object in objects {
            if object.obj_handle == MDS_HANDLE {
                return Err(PhdError::InvalidData(
                    "Configuration object uses the MDS handle".into(),
                ));
            }
            if mds.objects.contains_key(&object.obj_handle) {
                return Err(PhdError::InvalidData(format!(
                    "Duplicate object handle {}",
                    object.obj_handle
                )));
            }
            mds.objects
                .insert(object.obj_handle, MdsObject::from_config(object)?);
        }
        Ok(mds)
    }

    pub fn system_id(&self) -> &[u8] {
        &self.system_id
    }

    pub fn dev_config_id(&self) -> u16 {
        self.dev_config_id
    }

    /// Attributes of the MDS object itself
    pub fn attributes(&self) -> &[Ava] {
        &self.attributes
    }

    pub fn attribute(&self, attribute_id: u16) -> Option<&Ava> {
        find_attribute(&self.attributes, attribute_id)
    }

    /// Replace or add an MDS attribute
    pub fn set_attribute(&mut self, ava: Ava) {
        upsert_attribute(&mut self.attributes, ava);
    }

    /// Select MDS attributes for a GET response
    ///
    /// An empty id list selects every attribute. Unknown ids are skipped.
    pub fn select_attributes(&self, attribute_ids: &[u16]) -> Vec<Ava> {
        if attribute_ids.is_empty() {
            return self.attributes.clone();
        }
        attribute_ids
            .iter()
            .filter_map(|id| self.attribute(*id).cloned())
            .collect()
    }

    pub fn object(&self, obj_handle: u16) -> Option<&MdsObject> {
        self.objects.get(&obj_handle)
    }

    pub fn objects(&self) -> impl Iterator<Item = &MdsObject> {
        self.objects.values()
    }

    /// Object list as carried in a configuration report
    pub fn config_objects(&self) -> Vec<ConfigObject> {
        self.objects.values().map(MdsObject::to_config).collect()
    }

    /// Merge attributes reported for `obj_handle` (GET/SET results)
    pub fn apply_attributes(&mut self, obj_handle: u16, attributes: &[Ava]) -> PhdResult<()> {
        if obj_handle == MDS_HANDLE {
            for ava in attributes {
                self.set_attribute(ava.clone());
            }
            return Ok(());
        }
        let object = self.objects.get_mut(&obj_handle).ok_or_else(|| {
            PhdError::InvalidData(format!("Unknown object handle {obj_handle}"))
        })?;
        for ava in attributes {
            object.set_attribute(ava.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phd_asn1::MderDecode;

    fn numeric(handle: u16, code: u16, unit: u16) -> ConfigObject {
        ConfigObject {
            obj_class: MDC_MOC_VMO_METRIC_NU,
            obj_handle: handle,
            attributes: vec![
                Ava::from_value(MDC_ATTR_ID_TYPE, &Type::new(MDC_PART_SCADA, code)).unwrap(),
                Ava::from_value(MDC_ATTR_UNIT_CODE, &unit).unwrap(),
                Ava::from_value(
                    MDC_ATTR_ATTRIBUTE_VAL_MAP,
                    &vec![
                        AttrValMapEntry::new(MDC_ATTR_NU_VAL_OBS_BASIC, 2),
                        AttrValMapEntry::new(MDC_ATTR_TIME_STAMP_ABS, 8),
                    ],
                )
                .unwrap(),
            ],
        }
    }

    #[test]
    fn test_from_config() {
        let mds = Mds::from_config(
            &[1, 2, 3, 4, 5, 6, 7, 8],
            0x4000,
            &[numeric(1, MDC_PULS_OXIM_SAT_O2, MDC_DIM_PERCENT)],
        )
        .unwrap();

        let object = mds.object(1).unwrap();
        assert_eq!(
            object.metric_type(),
            Some(Type::new(MDC_PART_SCADA, MDC_PULS_OXIM_SAT_O2))
        );
        assert_eq!(object.unit_code(), Some(MDC_DIM_PERCENT));
        assert_eq!(object.fixed_observation_len(), 10);

        let sys_id = mds.attribute(MDC_ATTR_SYS_ID).unwrap();
        assert_eq!(sys_id.attribute_value, vec![0, 8, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(u16::from_bytes(&mds.attribute(MDC_ATTR_DEV_CONFIG_ID).unwrap().attribute_value).unwrap(), 0x4000);
        assert_eq!(mds.config_objects().len(), 1);
    }

    #[test]
    fn test_rejects_bad_handles() {
        let err = Mds::from_config(&[0; 8], 0x4000, &[numeric(0, 1, 1)]).unwrap_err();
        assert!(matches!(err, PhdError::InvalidData(_)));
        let err = Mds::from_config(&[0; 8], 0x4000, &[numeric(2, 1, 1), numeric(2, 3, 1)])
            .unwrap_err();
        assert!(matches!(err, PhdError::InvalidData(_)));
    }

    #[test]
    fn test_apply_attributes() {
        let mut mds = Mds::from_config(&[0; 8], 0x4000, &[numeric(1, 1, 1)]).unwrap();
        let map = Ava::from_value(
            MDC_ATTR_ATTRIBUTE_VAL_MAP,
            &vec![AttrValMapEntry::new(MDC_ATTR_NU_VAL_OBS_SIMP, 4)],
        )
        .unwrap();
        mds.apply_attributes(1, &[map]).unwrap();
        assert_eq!(mds.object(1).unwrap().fixed_observation_len(), 4);

        mds.apply_attributes(MDS_HANDLE, &[Ava::new(MDC_ATTR_TIME_ABS, vec![0x20; 8])])
            .unwrap();
        assert!(mds.attribute(MDC_ATTR_TIME_ABS).is_some());
        assert!(mds.apply_attributes(9, &[]).is_err());

        assert_eq!(mds.select_attributes(&[MDC_ATTR_TIME_ABS, 1]).len(), 1);
        assert_eq!(mds.select_attributes(&[]).len(), mds.attributes().len());
    }
}
